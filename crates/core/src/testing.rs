//! Shared fixtures for unit tests.

use url::Url;

use crate::{
    audio::{AudioBuffer, AudioDecoder},
    fetch::{animation_frame_url, media_url, MemoryFetcher},
    HuesError, Result,
};

/// Decodes a track whose body is its length in seconds, as text.
pub(crate) struct SecondsDecoder;

impl AudioDecoder for SecondsDecoder {
    fn decode(&self, bytes: Vec<u8>, _extension: &str) -> Result<AudioBuffer> {
        let text = String::from_utf8(bytes).map_err(|e| HuesError::Decode(e.to_string()))?;
        let seconds: f64 = text
            .trim()
            .parse()
            .map_err(|_| HuesError::Decode(format!("`{text}` is not a length")))?;
        Ok(AudioBuffer::silence(seconds, 100, 1))
    }
}

pub(crate) fn formats() -> Vec<String> {
    vec!["opus".to_string(), "ogg".to_string(), "mp3".to_string()]
}

pub(crate) fn test_pack_url(name: &str) -> Url {
    Url::parse(&format!("file:///respacks/{name}/")).unwrap()
}

pub(crate) fn put(fetcher: &mut MemoryFetcher, pack: &Url, path: &str, body: &str) {
    fetcher.insert(&pack.join(path).unwrap(), body);
}

pub(crate) fn put_track(fetcher: &mut MemoryFetcher, pack: &Url, name: &str, format: &str, seconds: f64) {
    let url = media_url(pack, "Songs", &format!("{name}.{format}")).unwrap();
    fetcher.insert(&url, seconds.to_string());
}

pub(crate) fn put_frames(fetcher: &mut MemoryFetcher, pack: &Url, name: &str, count: usize) {
    for frame in 1..=count {
        let url = animation_frame_url(pack, name, frame).unwrap();
        fetcher.insert(&url, format!("frame {frame}"));
    }
}

/// Three hues, two songs ("Alpha": `x---` over 4s; "Beta": `o.x.` over 2s
/// with a 2s buildup and no buildup rhythm), four stills and one three-frame
/// animation.
pub(crate) fn put_demo_pack(fetcher: &mut MemoryFetcher, pack: &Url, name: &str) {
    put(
        fetcher,
        pack,
        "info.xml",
        &format!("<info><name>{name}</name><author>Tester</author></info>"),
    );
    put(
        fetcher,
        pack,
        "hues.xml",
        r##"<hues>
              <hue name="Black">#000000</hue>
              <hue name="Red">#FF0000</hue>
              <hue name="Blue">0000ff</hue>
            </hues>"##,
    );
    put(
        fetcher,
        pack,
        "songs.xml",
        r#"<songs>
             <song name="loop_Alpha"><title>Alpha</title><rhythm>x---</rhythm></song>
             <song name="loop_Beta">
               <title>Beta</title>
               <rhythm>o.x.</rhythm>
               <buildup>build_Beta</buildup>
             </song>
           </songs>"#,
    );
    put_track(fetcher, pack, "loop_Alpha", "ogg", 4.0);
    put_track(fetcher, pack, "loop_Beta", "opus", 2.0);
    put_track(fetcher, pack, "build_Beta", "mp3", 2.0);

    put(
        fetcher,
        pack,
        "images.xml",
        r#"<images>
             <image name="One"/>
             <image name="Two"/>
             <image name="Three"/>
             <image name="Dance"><frameDuration>80</frameDuration></image>
             <image name="Four"/>
           </images>"#,
    );
    for still in ["One", "Two", "Three", "Four"] {
        let url = media_url(pack, "Images", &format!("{still}.png")).unwrap();
        fetcher.insert(&url, still);
    }
    put_frames(fetcher, pack, "Dance", 3);
}

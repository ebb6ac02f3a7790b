use crate::assets::Category;

/// Result alias that carries the custom [`HuesError`] type.
pub type Result<T> = std::result::Result<T, HuesError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum HuesError {
    /// Free-form failure that does not fit any of the structured variants.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A manifest answered with a status that is not usable for this pack.
    #[error("could not fetch respack {manifest}: {status} {reason}")]
    ManifestStatus {
        manifest: &'static str,
        status: u16,
        reason: String,
    },
    #[error("could not parse color value for {name}: {value}")]
    InvalidColor { name: String, value: String },
    #[error("song `{title}` has an empty rhythm")]
    EmptyRhythm { title: String },
    /// Every entry of the track format fallback list failed.
    #[error("could not find any supported audio track format for `{track}`")]
    UnsupportedTrack { track: String },
    #[error("could not decode audio: {0}")]
    Decode(String),
    #[error("failed to fetch frame {frame} of image `{image}` in {respack}: {status} {reason}")]
    FrameFetch {
        image: String,
        respack: String,
        frame: usize,
        status: u16,
        reason: String,
    },
    #[error("animation for image `{image}` in {respack} had no frames")]
    EmptyAnimation { image: String, respack: String },
    #[error("failed to fetch image `{image}` in {respack}: {status} {reason}")]
    ImageFetch {
        image: String,
        respack: String,
        status: u16,
        reason: String,
    },
    #[error("unknown respack: {0}")]
    UnknownRespack(String),
    #[error("respack does not contain {category}: {respack}")]
    MissingCategory { respack: String, category: Category },
    #[error("{what} index {index} out of range (0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("unknown auto mode: {0}")]
    UnknownAutoMode(String),
    #[error("no song is selected")]
    NoSongSelected,
    #[error("no songs are loaded")]
    NoSongs,
    #[error("audio output error: {0}")]
    Audio(String),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported URL `{0}`")]
    UnsupportedUrl(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl HuesError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for HuesError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for HuesError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<quick_xml::Error> for HuesError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

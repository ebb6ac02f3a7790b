//! Engine notifications and the listener registry.
//!
//! Listeners are reference-counted callbacks keyed by [`EventKind`]. The same
//! callback may be registered several times; [`EventBus::remove_listener`]
//! drops every registration of it, while [`EventBus::unsubscribe`] drops
//! exactly the one registration identified by a [`ListenerId`].

use std::{collections::HashMap, fmt, rc::Rc, str::FromStr, sync::Arc};

use crate::{
    assets::{Hue, Image, Song},
    mapping::BeatEffect,
    timeline::Beat,
    AutoMode, HuesError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProgressStart,
    Progress,
    ProgressEnd,
    AutoModeChange,
    HueChange,
    ImageChange,
    SongChange,
    Beat,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::ProgressStart,
        EventKind::Progress,
        EventKind::ProgressEnd,
        EventKind::AutoModeChange,
        EventKind::HueChange,
        EventKind::ImageChange,
        EventKind::SongChange,
        EventKind::Beat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::ProgressStart => "progressstart",
            EventKind::Progress => "progress",
            EventKind::ProgressEnd => "progressend",
            EventKind::AutoModeChange => "automodechange",
            EventKind::HueChange => "huechange",
            EventKind::ImageChange => "imagechange",
            EventKind::SongChange => "songchange",
            EventKind::Beat => "beat",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = HuesError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| HuesError::UnknownEvent(lowered))
    }
}

#[derive(Debug, Clone)]
pub struct HueInfo {
    pub index: usize,
    pub hue: Arc<Hue>,
}

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub index: usize,
    pub image: Arc<Image>,
}

#[derive(Debug, Clone)]
pub struct SongInfo {
    pub index: usize,
    pub song: Arc<Song>,
}

/// A beat transition; `character` and `effect` are absent for the idle beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatInfo {
    pub beat: Beat,
    pub character: Option<char>,
    pub effect: Option<BeatEffect>,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    ProgressStart,
    Progress { completed: usize, added: usize },
    ProgressEnd,
    AutoModeChange(AutoMode),
    HueChange(HueInfo),
    ImageChange(ImageInfo),
    SongChange(SongInfo),
    Beat(BeatInfo),
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::ProgressStart => EventKind::ProgressStart,
            EngineEvent::Progress { .. } => EventKind::Progress,
            EngineEvent::ProgressEnd => EventKind::ProgressEnd,
            EngineEvent::AutoModeChange(_) => EventKind::AutoModeChange,
            EngineEvent::HueChange(_) => EventKind::HueChange,
            EngineEvent::ImageChange(_) => EventKind::ImageChange,
            EngineEvent::SongChange(_) => EventKind::SongChange,
            EngineEvent::Beat(_) => EventKind::Beat,
        }
    }
}

pub type Listener = Rc<dyn Fn(&EngineEvent)>;

/// Identifies one registration returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Registers by event name, case-insensitively.
    pub fn add_listener(&mut self, event: &str, listener: Listener) -> Result<ListenerId> {
        let kind = event.parse()?;
        Ok(self.subscribe(kind, listener))
    }

    /// Removes every registration of `listener` for `event`, returning how
    /// many were removed.
    pub fn remove_listener(&mut self, event: &str, listener: &Listener) -> Result<usize> {
        let kind: EventKind = event.parse()?;
        let target = Rc::as_ptr(listener) as *const ();
        let Some(registered) = self.listeners.get_mut(&kind) else {
            return Ok(0);
        };
        let before = registered.len();
        registered.retain(|(_, existing)| Rc::as_ptr(existing) as *const () != target);
        Ok(before - registered.len())
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        for registered in self.listeners.values_mut() {
            if let Some(position) = registered.iter().position(|(existing, _)| *existing == id) {
                registered.remove(position);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Calls listeners in registration order.
    pub fn emit(&self, event: &EngineEvent) {
        if let Some(registered) = self.listeners.get(&event.kind()) {
            for (_, listener) in registered {
                listener(event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(kind, registered)| (kind.name(), registered.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, Listener) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Rc::new(move |event: &EngineEvent| {
            sink.borrow_mut().push(event.kind().name().to_string());
        });
        (seen, listener)
    }

    #[test]
    fn event_names_are_case_insensitive() {
        assert_eq!("HueChange".parse::<EventKind>().unwrap(), EventKind::HueChange);
        assert_eq!("PROGRESSEND".parse::<EventKind>().unwrap(), EventKind::ProgressEnd);
        let err = "explode".parse::<EventKind>().unwrap_err();
        assert_eq!(format!("{err}"), "unknown event: explode");
    }

    #[test]
    fn same_callback_registered_twice_fires_twice() {
        let mut bus = EventBus::new();
        let (seen, listener) = recorder();
        bus.add_listener("progressstart", listener.clone()).unwrap();
        bus.add_listener("progressstart", listener).unwrap();

        bus.emit(&EngineEvent::ProgressStart);
        bus.emit(&EngineEvent::ProgressEnd);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn remove_listener_drops_all_instances() {
        let mut bus = EventBus::new();
        let (seen, listener) = recorder();
        let (_, other) = recorder();
        bus.add_listener("beat", listener.clone()).unwrap();
        bus.add_listener("beat", other).unwrap();
        bus.add_listener("beat", listener.clone()).unwrap();

        assert_eq!(bus.remove_listener("beat", &listener).unwrap(), 2);
        assert_eq!(bus.listener_count(EventKind::Beat), 1);
        bus.emit(&EngineEvent::ProgressStart);
        assert!(seen.borrow().is_empty());
        assert!(bus.remove_listener("nonsense", &listener).is_err());
    }

    #[test]
    fn unsubscribe_removes_one_registration() {
        let mut bus = EventBus::new();
        let (seen, listener) = recorder();
        let first = bus.subscribe(EventKind::ProgressEnd, listener.clone());
        bus.subscribe(EventKind::ProgressEnd, listener);

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.emit(&EngineEvent::ProgressEnd);
        assert_eq!(seen.borrow().as_slice(), ["progressend"]);
    }
}

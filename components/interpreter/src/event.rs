//! Script event identifiers.

use std::fmt;

/// Events the host or the display collaborator dispatches to objects.
///
/// Each event maps to the method name a script defines to handle it.
///
/// # Examples
///
/// ```
/// use interpreter::EventId;
///
/// assert_eq!(EventId::EnterFrame.method_name(), "onEnterFrame");
/// assert_eq!(EventId::from_method_name("onkeydown"), Some(EventId::KeyDown));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventId {
    Press,
    Release,
    ReleaseOutside,
    RollOver,
    RollOut,
    DragOver,
    DragOut,
    KeyPress,
    Initialize,
    Load,
    Unload,
    EnterFrame,
    MouseDown,
    MouseUp,
    MouseMove,
    KeyDown,
    KeyUp,
    Data,
    Construct,
    SetFocus,
    KillFocus,
    Changed,
    SoundComplete,
    Status,
}

impl EventId {
    /// Every event, in table order.
    pub const ALL: [EventId; 24] = [
        EventId::Press,
        EventId::Release,
        EventId::ReleaseOutside,
        EventId::RollOver,
        EventId::RollOut,
        EventId::DragOver,
        EventId::DragOut,
        EventId::KeyPress,
        EventId::Initialize,
        EventId::Load,
        EventId::Unload,
        EventId::EnterFrame,
        EventId::MouseDown,
        EventId::MouseUp,
        EventId::MouseMove,
        EventId::KeyDown,
        EventId::KeyUp,
        EventId::Data,
        EventId::Construct,
        EventId::SetFocus,
        EventId::KillFocus,
        EventId::Changed,
        EventId::SoundComplete,
        EventId::Status,
    ];

    /// Handler method name.
    pub const fn method_name(self) -> &'static str {
        match self {
            EventId::Press => "onPress",
            EventId::Release => "onRelease",
            EventId::ReleaseOutside => "onReleaseOutside",
            EventId::RollOver => "onRollOver",
            EventId::RollOut => "onRollOut",
            EventId::DragOver => "onDragOver",
            EventId::DragOut => "onDragOut",
            EventId::KeyPress => "onKeyPress",
            EventId::Initialize => "onInitialize",
            EventId::Load => "onLoad",
            EventId::Unload => "onUnload",
            EventId::EnterFrame => "onEnterFrame",
            EventId::MouseDown => "onMouseDown",
            EventId::MouseUp => "onMouseUp",
            EventId::MouseMove => "onMouseMove",
            EventId::KeyDown => "onKeyDown",
            EventId::KeyUp => "onKeyUp",
            EventId::Data => "onData",
            EventId::Construct => "onConstruct",
            EventId::SetFocus => "onSetFocus",
            EventId::KillFocus => "onKillFocus",
            EventId::Changed => "onChanged",
            EventId::SoundComplete => "onSoundComplete",
            EventId::Status => "onStatus",
        }
    }

    /// Reverse of [`EventId::method_name`], case-insensitive like member names.
    pub fn from_method_name(name: &str) -> Option<EventId> {
        Self::ALL
            .into_iter()
            .find(|event| event.method_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

//! Customizable keybindings for the timeline.
//!
//! A binding maps a key chord to a [`TimelineCommand`], optionally guarded by
//! a [`WhenClause`] evaluated against the controller's [`ContextFlags`].
//! Bindings later in the list take precedence, so user overrides are appended
//! after the defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keyboard keys the timeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

impl Key {
    /// Letters compare case-insensitively.
    fn normalized(self) -> Self {
        match self {
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        }
    }
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };
    pub const CTRL_SHIFT: Modifiers = Modifiers {
        ctrl: true,
        shift: true,
        ..Modifiers::NONE
    };
}

/// A key plus the modifiers held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub const fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub const fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    pub fn matches(&self, key: Key, modifiers: Modifiers) -> bool {
        self.key.normalized() == key.normalized() && self.modifiers == modifiers
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        if m.ctrl {
            f.write_str("Ctrl+")?;
        }
        if m.alt {
            f.write_str("Alt+")?;
        }
        if m.shift {
            f.write_str("Shift+")?;
        }
        if m.meta {
            f.write_str("Meta+")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            other => f.write_str(key_to_string(other)),
        }
    }
}

/// Convert a non-character key to a display string.
pub fn key_to_string(key: Key) -> &'static str {
    match key {
        Key::Char(_) => "?",
        Key::Enter => "Enter",
        Key::Escape => "Escape",
        Key::Backspace => "Backspace",
        Key::Delete => "Delete",
        Key::Tab => "Tab",
        Key::Space => "Space",
        Key::Up => "Up",
        Key::Down => "Down",
        Key::Left => "Left",
        Key::Right => "Right",
        Key::Home => "Home",
        Key::End => "End",
        Key::PageUp => "PageUp",
        Key::PageDown => "PageDown",
    }
}

/// Operations reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineCommand {
    AddKeyframe,
    CopyPreviousKeyframe,
    ToggleVisibility,
    DeleteKeyframe,
    /// `[`: mark the start of a visible range
    MarkVisibleStart,
    /// `]`: mark the end and paint the range visible
    MarkVisibleEnd,
    StepBackward,
    StepForward,
    LargeStepBackward,
    LargeStepForward,
    JumpToStart,
    JumpToEnd,
    PreviousKeyframe,
    NextKeyframe,
    Undo,
    Redo,
    CancelGesture,
}

impl TimelineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TimelineCommand::AddKeyframe => "Add keyframe",
            TimelineCommand::CopyPreviousKeyframe => "Copy previous keyframe",
            TimelineCommand::ToggleVisibility => "Toggle visibility",
            TimelineCommand::DeleteKeyframe => "Delete keyframe",
            TimelineCommand::MarkVisibleStart => "Mark visible start",
            TimelineCommand::MarkVisibleEnd => "Mark visible end",
            TimelineCommand::StepBackward => "Previous frame",
            TimelineCommand::StepForward => "Next frame",
            TimelineCommand::LargeStepBackward => "Jump back",
            TimelineCommand::LargeStepForward => "Jump forward",
            TimelineCommand::JumpToStart => "First frame",
            TimelineCommand::JumpToEnd => "Last frame",
            TimelineCommand::PreviousKeyframe => "Previous keyframe",
            TimelineCommand::NextKeyframe => "Next keyframe",
            TimelineCommand::Undo => "Undo",
            TimelineCommand::Redo => "Redo",
            TimelineCommand::CancelGesture => "Cancel",
        }
    }
}

/// Controller state a when-clause can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextFlag {
    HasSelection,
    /// The current frame holds a keyframe of the selected annotation
    OnKeyframe,
    GestureActive,
    BracketPending,
    TrackingInFlight,
    CanUndo,
    CanRedo,
}

/// Snapshot of the flags a when-clause is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    pub has_selection: bool,
    pub on_keyframe: bool,
    pub gesture_active: bool,
    pub bracket_pending: bool,
    pub tracking_in_flight: bool,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl ContextFlags {
    pub fn get(&self, flag: ContextFlag) -> bool {
        match flag {
            ContextFlag::HasSelection => self.has_selection,
            ContextFlag::OnKeyframe => self.on_keyframe,
            ContextFlag::GestureActive => self.gesture_active,
            ContextFlag::BracketPending => self.bracket_pending,
            ContextFlag::TrackingInFlight => self.tracking_in_flight,
            ContextFlag::CanUndo => self.can_undo,
            ContextFlag::CanRedo => self.can_redo,
        }
    }
}

/// Boolean guard on a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhenClause {
    Var(ContextFlag),
    Not(Box<WhenClause>),
    And(Vec<WhenClause>),
    Or(Vec<WhenClause>),
}

impl WhenClause {
    pub fn var(flag: ContextFlag) -> Self {
        WhenClause::Var(flag)
    }

    pub fn not(clause: WhenClause) -> Self {
        WhenClause::Not(Box::new(clause))
    }

    /// Empty `And` is true, empty `Or` is false.
    pub fn evaluate(&self, flags: &ContextFlags) -> bool {
        match self {
            WhenClause::Var(flag) => flags.get(*flag),
            WhenClause::Not(inner) => !inner.evaluate(flags),
            WhenClause::And(clauses) => clauses.iter().all(|c| c.evaluate(flags)),
            WhenClause::Or(clauses) => clauses.iter().any(|c| c.evaluate(flags)),
        }
    }
}

/// One keyboard binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub chord: KeyChord,
    pub command: TimelineCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenClause>,
}

impl KeyBinding {
    pub fn new(chord: KeyChord, command: TimelineCommand) -> Self {
        Self {
            chord,
            command,
            when: None,
        }
    }

    pub fn when(mut self, clause: WhenClause) -> Self {
        self.when = Some(clause);
        self
    }

    fn applies(&self, key: Key, modifiers: Modifiers, flags: &ContextFlags) -> bool {
        self.chord.matches(key, modifiers)
            && self.when.as_ref().is_none_or(|w| w.evaluate(flags))
    }
}

/// Keybinding configuration for the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBindings {
    bindings: Vec<KeyBinding>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use ContextFlag::*;
        use TimelineCommand::*;

        let selected = || WhenClause::var(HasSelection);
        let bindings = vec![
            KeyBinding::new(KeyChord::plain(Key::Char('k')), AddKeyframe).when(selected()),
            KeyBinding::new(KeyChord::plain(Key::Char('c')), CopyPreviousKeyframe)
                .when(selected()),
            KeyBinding::new(KeyChord::plain(Key::Char('v')), ToggleVisibility).when(selected()),
            KeyBinding::new(KeyChord::plain(Key::Delete), DeleteKeyframe)
                .when(WhenClause::And(vec![selected(), WhenClause::var(OnKeyframe)])),
            KeyBinding::new(KeyChord::plain(Key::Char('[')), MarkVisibleStart).when(selected()),
            KeyBinding::new(KeyChord::plain(Key::Char(']')), MarkVisibleEnd)
                .when(WhenClause::var(BracketPending)),
            KeyBinding::new(KeyChord::plain(Key::Left), StepBackward),
            KeyBinding::new(KeyChord::plain(Key::Right), StepForward),
            KeyBinding::new(KeyChord::new(Key::Left, Modifiers::SHIFT), LargeStepBackward),
            KeyBinding::new(KeyChord::new(Key::Right, Modifiers::SHIFT), LargeStepForward),
            KeyBinding::new(KeyChord::plain(Key::Home), JumpToStart),
            KeyBinding::new(KeyChord::plain(Key::End), JumpToEnd),
            KeyBinding::new(KeyChord::new(Key::Left, Modifiers::ALT), PreviousKeyframe)
                .when(selected()),
            KeyBinding::new(KeyChord::new(Key::Right, Modifiers::ALT), NextKeyframe)
                .when(selected()),
            KeyBinding::new(KeyChord::new(Key::Char('z'), Modifiers::CTRL), Undo)
                .when(WhenClause::And(vec![
                    WhenClause::var(CanUndo),
                    WhenClause::not(WhenClause::var(GestureActive)),
                ])),
            KeyBinding::new(KeyChord::new(Key::Char('z'), Modifiers::CTRL_SHIFT), Redo)
                .when(WhenClause::And(vec![
                    WhenClause::var(CanRedo),
                    WhenClause::not(WhenClause::var(GestureActive)),
                ])),
            KeyBinding::new(KeyChord::plain(Key::Escape), CancelGesture).when(WhenClause::Or(
                vec![WhenClause::var(GestureActive), WhenClause::var(BracketPending)],
            )),
        ];
        Self { bindings }
    }
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings without any entries.
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    /// Resolve a key press to a command under the current context.
    pub fn command_for(
        &self,
        key: Key,
        modifiers: Modifiers,
        flags: &ContextFlags,
    ) -> Option<TimelineCommand> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.applies(key, modifiers, flags))
            .map(|b| b.command)
    }

    /// Add a binding that takes precedence over existing ones.
    pub fn bind(&mut self, binding: KeyBinding) {
        log::debug!("Bound {} to {:?}", binding.chord, binding.command);
        self.bindings.push(binding);
    }

    /// Remove every binding for `command`.
    pub fn unbind(&mut self, command: TimelineCommand) {
        self.bindings.retain(|b| b.command != command);
    }

    /// Chords bound to `command`, in precedence order (strongest first).
    pub fn chords_for(&self, command: TimelineCommand) -> Vec<KeyChord> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.command == command)
            .map(|b| b.chord)
            .collect()
    }

    /// Check if a chord is already used by a different command.
    /// Returns the conflicting command, if any.
    pub fn key_conflict(
        &self,
        chord: KeyChord,
        exclude: Option<TimelineCommand>,
    ) -> Option<TimelineCommand> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| Some(b.command) != exclude)
            .find(|b| b.chord.matches(chord.key, chord.modifiers))
            .map(|b| b.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected() -> ContextFlags {
        ContextFlags {
            has_selection: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        let flags = selected();
        let cases = [
            (Key::Char('k'), Modifiers::NONE, TimelineCommand::AddKeyframe),
            (Key::Char('K'), Modifiers::NONE, TimelineCommand::AddKeyframe),
            (Key::Char('c'), Modifiers::NONE, TimelineCommand::CopyPreviousKeyframe),
            (Key::Char('v'), Modifiers::NONE, TimelineCommand::ToggleVisibility),
            (Key::Char('['), Modifiers::NONE, TimelineCommand::MarkVisibleStart),
            (Key::Left, Modifiers::NONE, TimelineCommand::StepBackward),
            (Key::Right, Modifiers::SHIFT, TimelineCommand::LargeStepForward),
            (Key::Home, Modifiers::NONE, TimelineCommand::JumpToStart),
            (Key::End, Modifiers::NONE, TimelineCommand::JumpToEnd),
            (Key::Right, Modifiers::ALT, TimelineCommand::NextKeyframe),
        ];
        for (key, modifiers, expected) in cases {
            assert_eq!(
                bindings.command_for(key, modifiers, &flags),
                Some(expected),
                "{:?} {:?}",
                key,
                modifiers
            );
        }
    }

    #[test]
    fn test_when_clause_gates_binding() {
        let bindings = KeyBindings::default();
        let idle = ContextFlags::default();
        assert_eq!(bindings.command_for(Key::Char('k'), Modifiers::NONE, &idle), None);
        assert_eq!(bindings.command_for(Key::Delete, Modifiers::NONE, &selected()), None);

        let on_keyframe = ContextFlags {
            on_keyframe: true,
            ..selected()
        };
        assert_eq!(
            bindings.command_for(Key::Delete, Modifiers::NONE, &on_keyframe),
            Some(TimelineCommand::DeleteKeyframe)
        );
    }

    #[test]
    fn test_undo_redo_chords() {
        let bindings = KeyBindings::default();
        let flags = ContextFlags {
            can_undo: true,
            can_redo: true,
            ..Default::default()
        };
        assert_eq!(
            bindings.command_for(Key::Char('z'), Modifiers::CTRL, &flags),
            Some(TimelineCommand::Undo)
        );
        assert_eq!(
            bindings.command_for(Key::Char('Z'), Modifiers::CTRL_SHIFT, &flags),
            Some(TimelineCommand::Redo)
        );
        let dragging = ContextFlags {
            gesture_active: true,
            ..flags
        };
        assert_eq!(bindings.command_for(Key::Char('z'), Modifiers::CTRL, &dragging), None);
    }

    #[test]
    fn test_when_clause_evaluation() {
        let flags = ContextFlags {
            gesture_active: true,
            ..Default::default()
        };
        assert!(WhenClause::And(vec![]).evaluate(&flags));
        assert!(!WhenClause::Or(vec![]).evaluate(&flags));
        let clause = WhenClause::Or(vec![
            WhenClause::var(ContextFlag::BracketPending),
            WhenClause::not(WhenClause::var(ContextFlag::HasSelection)),
        ]);
        assert!(clause.evaluate(&flags));
    }

    #[test]
    fn test_user_binding_overrides_default() {
        let mut bindings = KeyBindings::default();
        bindings.bind(KeyBinding::new(
            KeyChord::plain(Key::Char('k')),
            TimelineCommand::ToggleVisibility,
        ));
        assert_eq!(
            bindings.command_for(Key::Char('k'), Modifiers::NONE, &selected()),
            Some(TimelineCommand::ToggleVisibility)
        );
        assert_eq!(
            bindings.key_conflict(
                KeyChord::plain(Key::Char('k')),
                Some(TimelineCommand::ToggleVisibility)
            ),
            Some(TimelineCommand::AddKeyframe)
        );

        bindings.unbind(TimelineCommand::ToggleVisibility);
        assert_eq!(
            bindings.command_for(Key::Char('k'), Modifiers::NONE, &selected()),
            Some(TimelineCommand::AddKeyframe)
        );
    }

    #[test]
    fn test_bindings_serde() {
        let bindings = KeyBindings::default();
        let json = serde_json::to_string(&bindings).unwrap();
        assert!(json.contains("\"var\":\"hasSelection\""));
        let parsed: KeyBindings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bindings);

        let custom: KeyBindings = serde_json::from_str(
            r#"[{"chord":{"key":{"char":"x"}},"command":"deleteKeyframe"}]"#,
        )
        .unwrap();
        assert_eq!(
            custom.command_for(Key::Char('x'), Modifiers::NONE, &ContextFlags::default()),
            Some(TimelineCommand::DeleteKeyframe)
        );
    }

    #[test]
    fn test_chord_display() {
        assert_eq!(
            KeyChord::new(Key::Char('z'), Modifiers::CTRL_SHIFT).to_string(),
            "Ctrl+Shift+Z"
        );
        assert_eq!(KeyChord::new(Key::Left, Modifiers::ALT).to_string(), "Alt+Left");
    }
}

//! Field configuration.
//!
//! ## Usage
//!
//! Start from [`TextFieldConfig::default`] and chain setters, or deserialize
//! the whole thing from JSON:
//!
//! ```
//! use tessera_editing::config::{KeyboardType, TextFieldConfig};
//!
//! let config = TextFieldConfig::default()
//!     .keyboard_type(KeyboardType::Number)
//!     .max_length(6)
//!     .placeholder("PIN");
//! assert_eq!(config.max_length, Some(6));
//!
//! let parsed: TextFieldConfig =
//!     serde_json::from_str(r#"{"keyboard_type": "email", "max_lines": 1}"#).unwrap();
//! assert_eq!(parsed.keyboard_type, KeyboardType::Email);
//! ```

use std::time::Duration;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::layout::TextStyle;

/// Input category, which selects the keyboard layout and character filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardType {
    /// Free text.
    #[default]
    Text,
    /// Free text with line breaks.
    Multiline,
    /// Digits.
    Number,
    /// Phone numbers.
    Phone,
    /// Email addresses.
    Email,
    /// URLs.
    Url,
    /// Passwords; starts obscured.
    VisiblePassword,
}

impl KeyboardType {
    /// Whether this is a password keyboard.
    pub fn is_password(self) -> bool {
        self == Self::VisiblePassword
    }
}

/// The action key the keyboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextInputAction {
    /// Platform default.
    Unspecified,
    /// No action.
    None,
    /// Navigate to the entered target.
    Go,
    /// Run a search.
    Search,
    /// Send the content.
    Send,
    /// Move to the next field.
    Next,
    /// Finish editing.
    #[default]
    Done,
}

impl TextInputAction {
    /// Numeric code reported to submit callbacks.
    pub fn code(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::None => 1,
            Self::Go => 2,
            Self::Search => 3,
            Self::Send => 4,
            Self::Next => 5,
            Self::Done => 6,
        }
    }
}

/// Where copied text may travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOptions {
    /// Copying is disabled.
    None,
    /// Within this application.
    InApp,
    /// Within this device.
    #[default]
    LocalDevice,
    /// Across devices.
    CrossDevice,
}

/// Action icon reserved at the trailing edge of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingIcon {
    /// Clears the text.
    Clear,
    /// Performs the search action.
    Search,
}

/// Timings and distances for gestures and caret animation.
#[derive(Debug, Clone, Copy, PartialEq, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionTiming {
    /// Caret blink half-period.
    pub twinkle_interval_ms: u64,
    /// Window in which a second tap counts as a double tap.
    pub double_click_ms: u64,
    /// Hold time after which a press becomes a long press.
    pub long_press_ms: u64,
    /// Maximum pointer travel for a press to still count as a tap.
    pub click_slop: f32,
    /// Twinkle ticks a freshly typed character stays visible in obscured
    /// fields.
    pub obscure_reveal_ticks: u32,
    /// Extra touch radius around selection handles.
    pub handle_hot_zone: f32,
    /// Duration of the caret slide between positions. Zero snaps.
    pub cursor_tween_ms: u64,
}

impl InteractionTiming {
    /// [`twinkle_interval_ms`](Self::twinkle_interval_ms) as a duration.
    pub fn twinkle_interval(&self) -> Duration {
        Duration::from_millis(self.twinkle_interval_ms)
    }

    /// [`double_click_ms`](Self::double_click_ms) as a duration.
    pub fn double_click(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }

    /// [`long_press_ms`](Self::long_press_ms) as a duration.
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    /// [`cursor_tween_ms`](Self::cursor_tween_ms) as a duration.
    pub fn cursor_tween(&self) -> Duration {
        Duration::from_millis(self.cursor_tween_ms)
    }
}

impl Default for InteractionTiming {
    fn default() -> Self {
        Self {
            twinkle_interval_ms: 500,
            double_click_ms: 500,
            long_press_ms: 500,
            click_slop: 5.0,
            obscure_reveal_ticks: 3,
            handle_hot_zone: 10.0,
            cursor_tween_ms: 0,
        }
    }
}

/// Everything that shapes a field's editing behavior.
#[derive(Debug, Clone, PartialEq, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFieldConfig {
    /// Input category.
    pub keyboard_type: KeyboardType,
    /// Keyboard action key.
    pub action: TextInputAction,
    /// Maximum length in UTF-16 code units. `None` is unbounded.
    #[setters(strip_option)]
    pub max_length: Option<usize>,
    /// Maximum visible lines. `1` makes the field single-line.
    pub max_lines: u32,
    /// Mask the displayed text.
    pub obscure: bool,
    /// Show the password visibility toggle on password fields.
    pub show_password_icon: bool,
    /// Allow-pattern for typed text; see [`InputFilter`](crate::formatter::InputFilter).
    #[setters(strip_option, into)]
    pub input_filter: Option<String>,
    /// Copy policy.
    pub copy_options: CopyOptions,
    /// Text shown while the field is empty.
    #[setters(into)]
    pub placeholder: String,
    /// Disabled fields ignore input and never open a keyboard.
    pub enabled: bool,
    /// Report a `len/max` counter.
    pub show_counter: bool,
    /// Inner padding around the text.
    pub padding: f32,
    /// Size of the trailing icon square.
    pub icon_size: f32,
    /// Optional trailing action icon.
    #[setters(strip_option)]
    pub trailing_icon: Option<TrailingIcon>,
    /// Font metrics handed to the paragraph engine.
    pub text_style: TextStyle,
    /// Gesture and animation timings.
    pub timing: InteractionTiming,
    /// Character drawn in place of obscured text.
    pub mask_char: char,
    /// Cap on undo snapshots.
    #[setters(strip_option)]
    pub history_limit: Option<usize>,
}

impl TextFieldConfig {
    /// Whether line breaks are accepted.
    pub fn is_multiline(&self) -> bool {
        self.max_lines != 1
    }

    /// Whether the field starts obscured.
    pub fn starts_obscured(&self) -> bool {
        self.obscure || self.keyboard_type.is_password()
    }

    /// Whether a trailing icon square is reserved.
    pub fn reserves_icon(&self) -> bool {
        self.trailing_icon.is_some() || (self.show_password_icon && self.keyboard_type.is_password())
    }
}

impl Default for TextFieldConfig {
    fn default() -> Self {
        Self {
            keyboard_type: KeyboardType::Text,
            action: TextInputAction::Done,
            max_length: None,
            max_lines: 1,
            obscure: false,
            show_password_icon: true,
            input_filter: None,
            copy_options: CopyOptions::LocalDevice,
            placeholder: String::new(),
            enabled: true,
            show_counter: false,
            padding: 8.0,
            icon_size: 24.0,
            trailing_icon: None,
            text_style: TextStyle::default(),
            timing: InteractionTiming::default(),
            mask_char: '\u{2022}',
            history_limit: None,
        }
    }
}

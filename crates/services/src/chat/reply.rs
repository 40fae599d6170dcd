use placement_core::model::UserId;

/// Who sent a message, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub sender: Sender,
    pub text: String,
    /// Phone number shared through the contact button, if any.
    pub contact_phone: Option<String>,
}

impl Incoming {
    #[must_use]
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            contact_phone: None,
        }
    }

    #[must_use]
    pub fn contact(sender: Sender, phone: impl Into<String>) -> Self {
        Self {
            sender,
            text: String::new(),
            contact_phone: Some(phone.into()),
        }
    }
}

/// Reply keyboard shown under a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    #[default]
    None,
    Options {
        buttons: Vec<String>,
        row_width: usize,
    },
    /// A single button that shares the user's phone number.
    RequestContact,
}

impl Keyboard {
    #[must_use]
    pub fn options<S: AsRef<str>>(buttons: &[S], row_width: usize) -> Self {
        Self::Options {
            buttons: buttons.iter().map(|b| b.as_ref().to_string()).collect(),
            row_width: row_width.max(1),
        }
    }

    /// Buttons grouped into rows of `row_width`.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<&str>> {
        match self {
            Keyboard::None => Vec::new(),
            Keyboard::Options { buttons, row_width } => buttons
                .chunks((*row_width).max(1))
                .map(|row| row.iter().map(String::as_str).collect())
                .collect(),
            Keyboard::RequestContact => vec![vec![SHARE_CONTACT_LABEL]],
        }
    }
}

pub const SHARE_CONTACT_LABEL: &str = "📞 Поділитися номером";

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::None,
        }
    }

    #[must_use]
    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

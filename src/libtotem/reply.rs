use crate::libtotem::action::Action;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    Action(Action),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub path: PathBuf,
    pub caption: String,
}

/// One outbound message: text, an optional keyboard (rows of buttons) and
/// an optional photo. When `image` is set, `text` is sent as its caption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
    pub image: Option<Image>,
}

impl Button {
    pub fn action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Action(action),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Url(url.into()),
        }
    }
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn image(path: PathBuf, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        Self {
            text: caption.clone(),
            buttons: Vec::new(),
            image: Some(Image { path, caption }),
        }
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        self.buttons.push(row);
        self
    }

    /// One button per row.
    pub fn column(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.buttons.extend(buttons.into_iter().map(|b| vec![b]));
        self
    }

    #[cfg(test)]
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.buttons.iter().flatten().filter_map(|b| match b.target {
            ButtonTarget::Action(action) => Some(action),
            ButtonTarget::Url(_) => None,
        })
    }
}

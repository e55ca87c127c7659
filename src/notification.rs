#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Follow-up the user can take from a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    OpenSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub action: Option<NoticeAction>,
}

impl UserNotice {
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, title, body)
    }

    pub fn with_action(mut self, action: NoticeAction) -> Self {
        self.action = Some(action);
        self
    }

    fn with_level(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            action: None,
        }
    }
}

pub trait Notifier {
    fn notify(&self, notice: &UserNotice);
}

#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, notice: &UserNotice) {
        let mut body = notice.body.clone();
        if notice.action == Some(NoticeAction::OpenSettings) {
            body.push_str("\nOpen Settings to grant access.");
        }
        if let Err(err) = notify_rust::Notification::new()
            .appname("FrameCam")
            .summary(&notice.title)
            .body(&body)
            .show()
        {
            tracing::warn!("system notification failed: {err}");
        }
    }
}

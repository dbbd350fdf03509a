mod fanout;
mod webpush;

pub use fanout::{
    EpisodeSummary, FanoutReport, MAX_BODY_CHARS, NotificationData, NotificationPayload, Notifier,
    PushSender,
};
pub use webpush::WebPushSender;

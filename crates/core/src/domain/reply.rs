/// Where a reply goes: a channel, threaded under `thread_ts` when known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub thread_ts: Option<String>,
}

impl ReplyTarget {
    pub fn new(channel_id: impl Into<String>, thread_ts: Option<String>) -> Self {
        let thread_ts = thread_ts.filter(|ts| !ts.trim().is_empty());
        Self { channel_id: channel_id.into(), thread_ts }
    }

    pub fn thread(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self::new(channel_id, Some(thread_ts.into()))
    }
}

use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ctf_client.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("ctf_client.client.request_errors");
pub(crate) static CLIENT_SESSIONS_EXPIRED: Counter =
    Counter::new("ctf_client.client.sessions_expired");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("ctf_client.client.request_duration_seconds");

pub(crate) static ENVELOPES_UNWRAPPED: Counter = Counter::new("ctf_client.envelope.unwrapped");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("ctf_client.stream.events");
pub(crate) static STREAM_CHUNKS: Counter = Counter::new("ctf_client.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ctf_client.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("ctf_client.stream.bytes");
pub(crate) static STREAM_TTFE: Moments = Moments::new("ctf_client.stream.ttfe_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("ctf_client.stream.duration_seconds");

pub(crate) static COLD_START_ADVISORIES: Counter =
    Counter::new("ctf_client.watchdog.cold_start_advisories");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_SESSIONS_EXPIRED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&ENVELOPES_UNWRAPPED);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFE);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&COLD_START_ADVISORIES);
}

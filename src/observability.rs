use biometrics::{Collector, Counter, Moments};

pub(crate) static COMPLETION_REQUESTS: Counter = Counter::new("tutorchat.completion.requests");
pub(crate) static COMPLETION_ERRORS: Counter = Counter::new("tutorchat.completion.errors");
pub(crate) static COMPLETION_DURATION: Moments =
    Moments::new("tutorchat.completion.duration_seconds");

pub(crate) static STORE_SESSIONS_CREATED: Counter =
    Counter::new("tutorchat.store.sessions_created");
pub(crate) static STORE_PERSISTS: Counter = Counter::new("tutorchat.store.persists");
pub(crate) static STORE_PERSIST_ERRORS: Counter = Counter::new("tutorchat.store.persist_errors");
pub(crate) static STORE_LOAD_REPAIRS: Counter = Counter::new("tutorchat.store.load_repairs");

pub(crate) static REVEAL_STARTS: Counter = Counter::new("tutorchat.render.reveal_starts");
pub(crate) static REVEAL_CANCELS: Counter = Counter::new("tutorchat.render.reveal_cancels");

pub(crate) static SERVER_REQUESTS: Counter = Counter::new("tutorchat.server.requests");
pub(crate) static SERVER_ERRORS: Counter = Counter::new("tutorchat.server.errors");
pub(crate) static SERVER_UPSTREAM_DURATION: Moments =
    Moments::new("tutorchat.server.upstream_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&COMPLETION_REQUESTS);
    collector.register_counter(&COMPLETION_ERRORS);
    collector.register_moments(&COMPLETION_DURATION);

    collector.register_counter(&STORE_SESSIONS_CREATED);
    collector.register_counter(&STORE_PERSISTS);
    collector.register_counter(&STORE_PERSIST_ERRORS);
    collector.register_counter(&STORE_LOAD_REPAIRS);

    collector.register_counter(&REVEAL_STARTS);
    collector.register_counter(&REVEAL_CANCELS);

    collector.register_counter(&SERVER_REQUESTS);
    collector.register_counter(&SERVER_ERRORS);
    collector.register_moments(&SERVER_UPSTREAM_DURATION);
}

use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec};

lazy_static! {
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by status",
        &["status"]
    ).unwrap();

    pub static ref REFRESH_COUNTER: CounterVec = register_counter_vec!(
        "api_token_refreshes_total",
        "Refresh-token rotations by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref REGISTRATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_registrations_total",
        "Registration attempts by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref COMPENSATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_upload_compensations_total",
        "Uploaded assets deleted after a failed write, by result",
        &["result"]
    ).unwrap();

    pub static ref OPTIONAL_UPLOAD_FAILURES: Counter = register_counter!(
        "api_optional_upload_failures_total",
        "Optional cover uploads that failed and were skipped"
    ).unwrap();
}

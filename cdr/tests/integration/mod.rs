mod coordinator;
mod log_sink;

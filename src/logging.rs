use chrono::Utc;

pub fn log_info(msg: &str) {
    println!("[{}] {}", Utc::now().to_rfc3339(), msg);
}

pub fn log_warn(msg: &str) {
    eprintln!("[{}] WARN {}", Utc::now().to_rfc3339(), msg);
}

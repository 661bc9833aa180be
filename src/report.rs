//! Console report formatting for merge and validation runs.

const WIDTH: usize = 60;

pub fn section(title: &str) {
    println!("\n{}", "=".repeat(WIDTH));
    println!("{title}");
    println!("{}", "=".repeat(WIDTH));
}

pub fn subsection(title: &str) {
    println!("\n{}", "-".repeat(WIDTH));
    println!("{title}");
    println!("{}", "-".repeat(WIDTH));
}

pub fn pass(message: &str) {
    println!("[PASS] {message}");
}

pub fn fail(message: &str) {
    println!("[FAIL] {message}");
}

pub fn warn(message: &str) {
    println!("[WARN] {message}");
}

pub fn info(message: &str) {
    println!("[INFO] {message}");
}

pub fn summary(passed: usize, failed: usize) {
    println!("\n{}", "=".repeat(WIDTH));
    println!("SUMMARY: {passed} passed, {failed} failed");
    println!("{}", "=".repeat(WIDTH));
}

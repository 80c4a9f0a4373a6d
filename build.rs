fn main() {
    // Stamp the binary with its build time, surfaced as scanbench::BUILD_DATE.
    let build_date = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    println!("cargo:rustc-env=BUILD_DATE={build_date}");
}

fn main() {
    // Stamped into the startup log line of the binary
    let build_date = chrono::Utc::now().format("%Y-%m-%dT%H:%MZ").to_string();
    println!("cargo:rustc-env=BUILD_DATE={}", build_date);
    println!("cargo:rerun-if-changed=build.rs");
}

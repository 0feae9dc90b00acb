fn main() {
    // CGEventSourceSecondsSinceLastEventType lives in CoreGraphics
    if cfg!(target_os = "macos") {
        println!("cargo:rustc-link-lib=framework=CoreGraphics");
        println!("cargo:rustc-link-lib=framework=ApplicationServices");
    }
}

fn main() {
    // ESP-IDF link arguments only apply to the firmware target; host builds
    // (unit tests) compile the library without the IDF toolchain.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}

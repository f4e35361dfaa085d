fn main() {
    // ESP-IDF link arguments only matter for the device build.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

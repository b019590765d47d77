//! Configuration access port trait.

/// Raw INI access. Numeric values come back as strings for
/// `config_validation::read_number` to parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Keys of `section` in declaration order; empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;

    fn has_section(&self, section: &str) -> bool;
}

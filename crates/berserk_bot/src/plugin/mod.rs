mod check_in;

pub use check_in::check_in_plugin;

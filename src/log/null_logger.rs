//! Without the `logging` feature no logger is installed. Only the `log` crate's maximum level is
//! kept in step with the configuration, so disabled macros stay cheap.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.max_level());
    }
}

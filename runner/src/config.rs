use clap::ValueEnum;
use wasmtime::{Config, OptLevel};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OptimizationLevel {
    None,
    Speed,
    SpeedAndSize,
}

impl From<OptimizationLevel> for OptLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::None => OptLevel::None,
            OptimizationLevel::Speed => OptLevel::Speed,
            OptimizationLevel::SpeedAndSize => OptLevel::SpeedAndSize,
        }
    }
}

/// Knobs for a single run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Emit DWARF for compiled code so traps carry source locations.
    pub debug_info: bool,
    pub opt_level: OptimizationLevel,
    /// Register the WASI environment shim before linking.
    pub wasi: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            debug_info: false,
            opt_level: OptimizationLevel::Speed,
            wasi: true,
        }
    }
}

impl RunConfig {
    pub fn engine_config(&self) -> Config {
        let mut config = Config::default();
        // Tag imports need the exceptions proposal to be enabled
        config
            .debug_info(self.debug_info)
            .cranelift_opt_level(self.opt_level.into())
            .wasm_exceptions(true);
        config
    }
}

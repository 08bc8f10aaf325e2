// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration: the handful of names and flags the populator and
//! aggregator need, all overridable from the CLI.

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the function that begins a critical section. TinyOS's
    /// nesC compiler emits `__nesc_atomic_start` by default.
    pub critical_start: String,
    /// Name of the function that ends a critical section.
    pub critical_stop: String,
    /// Recursion found in the call graph is repaired (back-edge dropped)
    /// instead of aborting the run.
    pub recursion_repair: bool,
    /// Task titles excluded from the generated header regardless of
    /// collisions or dependency count.
    pub header_exceptions: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            critical_start: "__nesc_atomic_start".to_string(),
            critical_stop: "__nesc_atomic_end".to_string(),
            recursion_repair: false,
            header_exceptions: vec![
                "__ctors_end-0x3a".to_string(),
                "ccitt_crc16_tabl".to_string(),
                "thread_task".to_string(),
            ],
        }
    }
}

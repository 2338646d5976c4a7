//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements   | Connects to                    |
//! |---------------|--------------|--------------------------------|
//! | `config_file` | ConfigPort   | JSON file on disk              |
//! | `history_csv` | HistoryPort  | Daily CSV files                |
//! | `log_sink`    | EventSink    | `log` facade                   |
//! | `sim`         | (HAL traits) | In-memory board + thermal model|
//! | `time`        | Clock        | OS wall clock                  |

pub mod config_file;
pub mod history_csv;
pub mod log_sink;
pub mod sim;
pub mod time;

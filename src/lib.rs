//! # midnam-server Library
//!
//! Load, validate and persist a single MIDI name document (MIDNAM) over HTTP.
//!
//! - **Validation**: libxml2 DTD validation plus `NoteNameList` checks for invalid,
//!   empty and duplicate note numbers and empty note names
//! - **Persistence**: timestamped backup of the previous document before every save
//! - **Retrieval**: the stored document, byte for byte
//!
//! ## Endpoints
//!
//! - `GET /load` (`/load_d4.php`)
//! - `POST /save` (`/save_d4.php`), form field `xml`
//! - `POST /validate` (`/validate_d4.php`), form field `xml`

pub mod cli;
pub mod config;
pub mod error;
pub mod libxml2;
pub mod logging;
pub mod middleware;
pub mod notes;
pub mod output;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;
pub mod validator;

pub use cli::{Cli, Command, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, LogFormat, SystemEnvProvider};
pub use error::{LibXml2Error, ServiceError, StorageOperation};
pub use libxml2::{LibXml2Wrapper, ValidationResult, XmlDiagnostic, XmlDtdPtr};
pub use notes::{Note, NoteNameList, NoteNumberGrammar};
pub use output::Output;
pub use server::{build_router, start_server};
pub use state::AppState;
pub use store::{DocumentStore, SaveOutcome};
pub use validator::{DocumentValidator, ValidationReport};

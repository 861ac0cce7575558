pub mod environment;
pub mod error;
pub mod interpret;
pub mod ops;
pub mod session;
pub mod stdlib;
pub mod types;

use error::Failure;
use log::trace;
use lume_syntax::source::ScriptSource;
use session::Session;

/// Run a whole program held in memory, as if it were a file called
/// `origin`. Compile errors are reported and skipped.
pub fn run(origin: &str, program: &str, session: &mut Session) -> Result<(), Failure> {
    trace!("Running {origin}");
    let mut source = ScriptSource::new(origin, program);
    session.run_source(&mut source)
}

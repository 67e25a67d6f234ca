//! Session state snapshot and on-disk session directory management.

pub mod session_dir;
pub mod session_state;

pub use session_dir::{
    install_skills, prepare_fresh_session, restore_session, strip_credentials, RestoreReport,
    SessionLayout, SessionPaths, SessionRestoreError, CREDENTIALS_FILE, SESSIONS_DIR, SKILLS_DIR,
    TMP_DIR,
};
pub use session_state::{SessionState, STATE_FILE_NAME};

pub mod use_session_sync;

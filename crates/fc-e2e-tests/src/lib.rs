//! End-to-end tests for the Frank Camper assistant.
//!
//! The tests live in `tests/`: they drive the HTTP router from `fc-server`
//! over the real `AiHandler`, tool catalogue and (mocked) Ollama backend.

//! Tripbot core library: a LINE travel assistant that turns chat messages into POI
//! searches through an LLM function call and answers with a model-written summary.

pub mod agent;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod poi;
pub mod reply;
pub mod routing;

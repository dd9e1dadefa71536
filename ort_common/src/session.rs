use std::path::Path;

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};

/// Registers the execution provider and loads `model` into a session.
pub fn load_session(model: &Path, cuda: bool) -> anyhow::Result<Session> {
    let (ep, ep_name) = if cuda {
        (CUDAExecutionProvider::default().build(), "cuda")
    } else {
        (CPUExecutionProvider::default().build(), "cpu")
    };

    ort::init().with_execution_providers([ep]).commit()?;

    let session = SessionBuilder::new()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model)?;
    log::debug!("{session:?}");

    log::info!("Prepared ort {ep_name} session with model: {model:?}");
    Ok(session)
}

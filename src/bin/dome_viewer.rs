//! Fly-through viewer of the dome scene.
//!
//! Usage: `dome-viewer [config.toml]`. Without a config file the built-in
//! defaults are used and assets are read from `./assets`.

use std::{future::Future, pin::Pin};

use dome_ngin::{
    config::ViewerConfig,
    context::InitContext,
    flow::{FlowConstructor, run},
    scene::DomeScene,
};

fn load_scene(init: InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<DomeScene>>>> {
    Box::pin(DomeScene::new(init))
}

fn main() -> anyhow::Result<()> {
    let config = ViewerConfig::from_args()?;
    let scene: FlowConstructor<DomeScene> = Box::new(load_scene);
    run(config, scene)
}

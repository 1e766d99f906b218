// Headless walkthrough: builds a small encounter on an in-memory host and
// logs what each frame would draw. `RUST_LOG=battlemap=debug` shows the
// scene's own tracing.
use std::error::Error;
use std::rc::Rc;

use futures::executor::LocalPool;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use battlemap::headless::{HeadlessHost, MemoryTextureSource, solid_png};
use battlemap::{
    Adapter, AdapterOptions, EventKind, FogOptions, GridOptions, LayerKind, LayerOptions, LightSpec, Modifiers,
    PointerEvent, TokenPatch, TokenSpec, Vec2,
};

// ── Assets ───────────────────────────────────────────────────────────────────
const MAP_URL: &str = "maps/cavern.png";
const KNIGHT_URL: &str = "tokens/knight.png";
const GOBLIN_URL: &str = "tokens/goblin.png";

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "battlemap=info".into()))
        .init();

    if let Err(e) = run() {
        tracing::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut pool = LocalPool::new();
    let host = HeadlessHost::new(1280, 720);
    let textures = MemoryTextureSource::new();
    textures.insert(MAP_URL, solid_png(64, 48, [52, 58, 70, 255])?);
    textures.insert(KNIGHT_URL, solid_png(16, 16, [200, 200, 220, 255])?);
    textures.insert(GOBLIN_URL, solid_png(16, 16, [90, 160, 60, 255])?);

    let map = Adapter::new(
        Rc::new(host.clone()),
        Rc::new(textures.clone()),
        Rc::new(pool.spawner()),
        AdapterOptions::with_cell_size(70.0),
    )?;

    for kind in [EventKind::TokenCreate, EventKind::TokenMove, EventKind::SelectionChange, EventKind::TokenPaste] {
        map.on(kind, move |event| tracing::info!(target: "battlemap::demo", "{kind}: {event:?}"));
    }

    pool.run_until(map.ready())?;

    let world = pool.run_until(map.load_map(Some(MAP_URL), 2100.0, 1400.0));
    tracing::info!(?world, "map loaded");
    pool.run_until(map.set_grid(GridOptions { opacity: Some(0.4), ..GridOptions::default() }));

    pool.run_until(async {
        map.add_token(TokenSpec::new("knight").at(105.0, 105.0).texture(KNIGHT_URL).name("Sir Roland")).await;
        map.add_token(TokenSpec::new("goblin-1").at(455.0, 245.0).texture(GOBLIN_URL)).await;
        map.add_token(TokenSpec::new("goblin-2").at(525.0, 245.0).texture(GOBLIN_URL)).await;
        map.create_layer(LayerOptions::new("markers").kind(LayerKind::Custom)).await;
        map.add_token(TokenSpec::new("x-marks").at(1015.0, 665.0).layer("markers")).await;
        map.add_light(LightSpec::new("torch").at(140.0, 140.0).radii(140.0, 280.0)).await;
        map.toggle_fog(true, FogOptions::opacity(0.5)).await;
    });
    // Texture loads complete in the background.
    pool.run_until_stalled();
    tracing::info!(knight_fetches = textures.fetch_count(KNIGHT_URL), goblin_fetches = textures.fetch_count(GOBLIN_URL));

    // Drag the knight to the right; the drop snaps to a cell center.
    let Some(start) = map.world_to_screen(Vec2::new(105.0, 105.0)) else {
        return Err("map is not ready".into());
    };
    let grab = PointerEvent::new(1, start).with_modifiers(Modifiers::NONE);
    map.pointer_down(grab);
    map.pointer_move(PointerEvent::new(1, start + Vec2::new(200.0, 10.0)));
    map.pointer_up(PointerEvent::new(1, start + Vec2::new(200.0, 10.0)));

    pool.run_until(async {
        map.set_selection(&["goblin-1", "goblin-2"]).await;
        map.copy_selection().await;
        map.paste_at(1400.0, 700.0).await;
        map.update_token("goblin-1", TokenPatch::default().rotation(90.0).tint("#ff4444")).await;
    });
    pool.run_until_stalled();

    map.tick(1.0 / 60.0);
    if let Some(frame) = host.last_frame() {
        for layer in &frame.layers {
            tracing::info!(layer = %layer.id, z = layer.z_index, commands = layer.commands.len(), "layer");
        }
        tracing::info!(tokens = ?frame.token_ids(), rings = ?frame.ringed_tokens(), "frame presented");
    }
    if let Some(knight) = map.get_token("knight") {
        tracing::info!(x = knight.x, y = knight.y, "knight dropped");
    }

    pool.run_until(map.destroy());
    tracing::info!(
        lifecycle = ?map.lifecycle(),
        attached = host.attached_count(),
        frames = host.frames_presented(),
        "done"
    );
    Ok(())
}

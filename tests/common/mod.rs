#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use battlemap::headless::{HeadlessHost, MemoryTextureSource, solid_png};
use battlemap::render::{DrawItem, Frame, Node, Sprite};
use battlemap::{Adapter, AdapterOptions, Event, EventKind};
use futures::executor::LocalPool;

pub struct Harness {
    pub pool: LocalPool,
    pub host: HeadlessHost,
    pub textures: MemoryTextureSource,
    pub map: Adapter,
}

impl Harness {
    /// An adapter on an 800×600 container; initialization not yet driven.
    pub fn start(options: AdapterOptions) -> Self {
        Self::start_on(HeadlessHost::new(800, 600), options)
    }

    pub fn start_on(host: HeadlessHost, options: AdapterOptions) -> Self {
        let pool = LocalPool::new();
        let textures = MemoryTextureSource::new();
        let map = Adapter::new(
            Rc::new(host.clone()),
            Rc::new(textures.clone()),
            Rc::new(pool.spawner()),
            options,
        )
        .expect("adapter construction");
        Self { pool, host, textures, map }
    }

    /// Like `start`, then wait for `ready`.
    pub fn ready(cell_size: f32) -> Self {
        let mut h = Self::start(AdapterOptions::with_cell_size(cell_size));
        h.pool.run_until(h.map.ready()).expect("map ready");
        h
    }

    /// Let spawned texture loads finish.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn frame(&self) -> Frame {
        self.map.frame().expect("map is ready")
    }

    pub fn png(&self, url: &str, rgba: [u8; 4]) {
        self.textures.insert(url, solid_png(4, 4, rgba).expect("png encode"));
    }
}

/// Collect every event of the given kinds, in dispatch order.
pub fn record(map: &Adapter, kinds: &[EventKind]) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for &kind in kinds {
        let log = Rc::clone(&log);
        map.on(kind, move |e| log.borrow_mut().push(e.clone()));
    }
    log
}

pub fn kinds(log: &Rc<RefCell<Vec<Event>>>) -> Vec<EventKind> {
    log.borrow().iter().map(Event::kind).collect()
}

pub fn token_sprite(frame: &Frame, id: &str) -> Option<Sprite> {
    frame.layers.iter().flat_map(|l| &l.commands).find_map(|c| match (&c.node, &c.item) {
        (Node::Token(t), DrawItem::Sprite(s)) if t == id => Some(s.clone()),
        _ => None,
    })
}

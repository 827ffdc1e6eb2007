//! Authored demo tiles: the standard catalog the harness runs on

use uuid::Uuid;

use crate::math::{Fp, FpVec2, FpVec3};
use crate::scene::{
    BodyDef, ColliderDef, ColliderShape, Component, ComponentData, ComponentId, DetectorDef,
    DetectorResponse, DoorDef, MarbleDef, RuntimeId, SimObject, SpinnerDef, WrapDef,
};
use crate::tile::{TemplateCatalog, TileTemplate};

/// Catalog index of the basin tile.
pub const BASIN: u16 = 0;
/// Catalog index of the gauntlet tile.
pub const GAUNTLET: u16 = 1;

// Render prefab slots the presentation layer maps these tiles onto.
const PREFAB_BLOCK: u16 = 1;
const PREFAB_MARBLE: u16 = 2;

/// The two-template catalog every replica must share.
///
/// Index 0 is the basin: a catch trough that swallows marbles within a
/// couple of seconds, so rounds on it always terminate. Index 1 is the
/// gauntlet: spinner, wrap band, pit, goal and a teleporter pad for
/// longer-lived rounds.
pub fn standard_catalog() -> TemplateCatalog {
    TemplateCatalog::new(vec![basin_tile(), gauntlet_tile()])
}

/// Hands out template-space ids in authoring order.
struct Ids {
    objects: u32,
    components: u32,
}

impl Ids {
    fn new() -> Ids {
        Ids {
            objects: 0,
            components: 0,
        }
    }

    fn object(&mut self) -> RuntimeId {
        self.objects += 1;
        RuntimeId::new(0, self.objects)
    }

    fn component(&mut self) -> ComponentId {
        self.components += 1;
        ComponentId::new(0, self.components)
    }
}

fn slab(hx: i64, hy: i64) -> ColliderDef {
    ColliderDef {
        shape: ColliderShape::Box {
            half: FpVec2::new(Fp::from_int(hx), Fp::from_int(hy)),
        },
        is_trigger: false,
    }
}

fn sensor_box(hx: Fp, hy: Fp) -> ColliderDef {
    ColliderDef {
        shape: ColliderShape::Box {
            half: FpVec2::new(hx, hy),
        },
        is_trigger: true,
    }
}

fn sensor_circle(radius: Fp) -> ColliderDef {
    ColliderDef {
        shape: ColliderShape::Circle { radius },
        is_trigger: true,
    }
}

fn at(x: i64, y: i64) -> FpVec3 {
    FpVec3::new(Fp::from_int(x), Fp::from_int(y), Fp::ZERO)
}

fn block(ids: &mut Ids, name: &str, position: FpVec3, collider: ColliderDef) -> SimObject {
    SimObject::new(ids.object(), name)
        .at(position)
        .prefab(PREFAB_BLOCK)
        .with(Component::new(
            ids.component(),
            ComponentData::Collider(collider),
        ))
        .with(Component::new(
            ids.component(),
            ComponentData::Body(BodyDef::fixed()),
        ))
}

fn catcher(
    ids: &mut Ids,
    name: &str,
    position: FpVec3,
    collider: ColliderDef,
    response: DetectorResponse,
) -> SimObject {
    SimObject::new(ids.object(), name)
        .at(position)
        .with(Component::new(
            ids.component(),
            ComponentData::Collider(collider),
        ))
        .with(Component::new(
            ids.component(),
            ComponentData::Body(BodyDef::fixed()),
        ))
        .with(Component::new(
            ids.component(),
            ComponentData::Detector(DetectorDef::on_enter(response)),
        ))
}

fn anchor(ids: &mut Ids, name: &str, position: FpVec3) -> SimObject {
    SimObject::new(ids.object(), name)
        .at(position)
        .with(Component::new(ids.component(), ComponentData::Anchor))
}

fn marble(ids: &mut Ids) -> SimObject {
    SimObject::new(ids.object(), "marble")
        .prefab(PREFAB_MARBLE)
        .with(Component::new(
            ids.component(),
            ComponentData::Collider(ColliderDef {
                shape: ColliderShape::Circle { radius: Fp::HALF },
                is_trigger: false,
            }),
        ))
        .with(Component::new(
            ids.component(),
            ComponentData::Body(BodyDef::dynamic(Fp::ONE)),
        ))
        .with(Component::new(
            ids.component(),
            ComponentData::Marble(MarbleDef { owner: Uuid::nil() }),
        ))
}

fn basin_tile() -> TileTemplate {
    let mut ids = Ids::new();
    let root_id = ids.object();
    let floor = block(&mut ids, "floor", at(0, -4), slab(12, 1));
    let left_wall = block(&mut ids, "wall_left", at(-11, 1), slab(1, 6));
    let right_wall = block(&mut ids, "wall_right", at(11, 1), slab(1, 6));
    // full-width trough above the floor: every falling marble scores out
    let trough = catcher(
        &mut ids,
        "trough",
        at(0, -2),
        sensor_box(Fp::from_int(10), Fp::HALF),
        DetectorResponse::Score { points: 100 },
    );
    // the gate lifts clear of the play area once armed
    let gate = block(&mut ids, "gate", at(0, 1), slab(3, 1)).with(Component::new(
        ids.component(),
        ComponentData::Door(DoorDef::closed(at(0, 4), 90)),
    ));
    let root = SimObject::new(root_id, "basin")
        .child(floor)
        .child(left_wall)
        .child(right_wall)
        .child(trough)
        .child(gate)
        .child(anchor(&mut ids, "spawn_left", at(-5, 4)))
        .child(anchor(&mut ids, "spawn_right", at(5, 4)));
    TileTemplate {
        name: "basin".to_string(),
        root,
        marble: Some(marble(&mut ids)),
        gravity: FpVec2::new(Fp::ZERO, Fp::from_int(-10)),
        velocity_iterations: 8,
        position_iterations: 3,
    }
}

fn gauntlet_tile() -> TileTemplate {
    let mut ids = Ids::new();
    let root_id = ids.object();
    let floor = block(&mut ids, "floor", at(0, -6), slab(14, 1));
    // the hatch slides far right, clear of every spawn column
    let hatch = block(&mut ids, "hatch", at(0, 2), slab(2, 1)).with(Component::new(
        ids.component(),
        ComponentData::Door(DoorDef::closed(at(10, 0), 120)),
    ));
    let paddle = block(&mut ids, "paddle", at(0, -1), slab(3, 1)).with(Component::new(
        ids.component(),
        ComponentData::Spinner(SpinnerDef { speed: Fp::PI }),
    ));
    let pit = catcher(
        &mut ids,
        "pit",
        at(-7, -4),
        sensor_box(Fp::from_int(2), Fp::HALF),
        DetectorResponse::Destroy,
    );
    let goal = catcher(
        &mut ids,
        "goal",
        at(7, -4),
        sensor_circle(Fp::ONE),
        DetectorResponse::Score { points: 250 },
    );
    // the booster pad flings marbles back to the rebound anchor up top
    let rebound_anchor = ids.component();
    let rebound = SimObject::new(ids.object(), "rebound")
        .at(at(0, 4))
        .with(Component::new(rebound_anchor, ComponentData::Anchor));
    let booster = catcher(
        &mut ids,
        "booster",
        at(0, -5),
        sensor_circle(Fp::from_ratio(3, 4)),
        DetectorResponse::Teleport {
            target: rebound_anchor,
        },
    );
    let root = SimObject::new(root_id, "gauntlet")
        .with(Component::new(
            ids.component(),
            ComponentData::Wrap(WrapDef {
                min_x: Fp::from_int(-12),
                max_x: Fp::from_int(12),
            }),
        ))
        .child(floor)
        .child(hatch)
        .child(paddle)
        .child(pit)
        .child(goal)
        .child(rebound)
        .child(booster)
        .child(anchor(&mut ids, "spawn_a", at(-6, 4)))
        .child(anchor(&mut ids, "spawn_b", at(6, 4)))
        .child(anchor(&mut ids, "spawn_c", at(0, 5)));
    TileTemplate {
        name: "gauntlet".to_string(),
        root,
        marble: Some(marble(&mut ids)),
        gravity: FpVec2::new(Fp::ZERO, Fp::from_int(-10)),
        velocity_iterations: 8,
        position_iterations: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Tile;

    #[test]
    fn both_templates_build_into_live_tiles() {
        let catalog = standard_catalog();
        assert_eq!(catalog.len(), 2);
        for index in [BASIN, GAUNTLET] {
            let template = catalog.get(index).expect("template").clone();
            let tile = Tile::new(index, template, 1).expect("tile builds");
            assert!(!tile.spawn_points().is_empty());
            assert_eq!(tile.marble_count(), 0);
        }
    }

    #[test]
    fn template_ids_are_unique_within_each_tile() {
        for template in [basin_tile(), gauntlet_tile()] {
            let mut objects = std::collections::BTreeSet::new();
            let mut components = std::collections::BTreeSet::new();
            template.root.visit(&mut |o| {
                assert!(objects.insert(o.id), "duplicate object id {}", o.id);
                for c in &o.components {
                    assert!(components.insert(c.id), "duplicate component id {}", c.id);
                }
            });
        }
    }

    #[test]
    fn the_gauntlet_teleporter_points_at_a_live_anchor() {
        let catalog = standard_catalog();
        let template = catalog.get(GAUNTLET).expect("template").clone();
        let tile = Tile::new(GAUNTLET, template, 3).expect("tile builds");
        let mut target = None;
        tile.root().visit(&mut |o| {
            if let Some((_, def)) = o.detector() {
                if let DetectorResponse::Teleport { target: t } = def.response {
                    target = Some(t);
                }
            }
        });
        let target = target.expect("teleporter authored");
        assert_eq!(target.world(), 3);
        assert!(tile.root().find_component(target).is_some());
    }
}

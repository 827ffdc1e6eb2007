//! Template instantiation with id reassignment

use std::collections::BTreeMap;

use super::component::{ComponentData, DetectorResponse};
use super::id::{ComponentId, IdAlloc};
use super::object::SimObject;

/// Clone a template subtree into a live tile, assigning fresh object and
/// component ids from `alloc`.
///
/// Two passes: the first clones and assigns ids in pre-order, recording
/// old-to-new component pairs; the second rewrites cross-component
/// references so links inside the copied subtree stay consistent.
/// References to components outside the subtree keep their original ids.
pub fn instantiate(template: &SimObject, alloc: &mut IdAlloc) -> SimObject {
    let mut map = BTreeMap::new();
    let mut fresh = assign(template, alloc, &mut map);
    remap(&mut fresh, &map);
    fresh
}

fn assign(
    node: &SimObject,
    alloc: &mut IdAlloc,
    map: &mut BTreeMap<ComponentId, ComponentId>,
) -> SimObject {
    let mut copy = SimObject::new(alloc.next_object_id(), node.name.clone());
    copy.local = node.local;
    copy.prefab = node.prefab;
    for component in &node.components {
        let id = alloc.next_component_id();
        map.insert(component.id, id);
        let mut fresh = component.clone();
        fresh.id = id;
        copy.components.push(fresh);
    }
    for child in &node.children {
        copy.children.push(assign(child, alloc, map));
    }
    copy
}

fn remap(node: &mut SimObject, map: &BTreeMap<ComponentId, ComponentId>) {
    for component in &mut node.components {
        if let ComponentData::Detector(def) = &mut component.data {
            if let DetectorResponse::Teleport { target } = &mut def.response {
                if let Some(new_id) = map.get(target) {
                    *target = *new_id;
                }
            }
        }
    }
    for child in &mut node.children {
        remap(child, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::component::{Component, DetectorDef};
    use crate::scene::id::RuntimeId;

    fn template_with_teleporter() -> SimObject {
        // template world 0, hand-assigned ids
        let pad_anchor = Component::new(ComponentId::new(0, 2), ComponentData::Anchor);
        let teleporter = Component::new(
            ComponentId::new(0, 1),
            ComponentData::Detector(DetectorDef::on_enter(DetectorResponse::Teleport {
                target: ComponentId::new(0, 2),
            })),
        );
        SimObject::new(RuntimeId::new(0, 1), "zone")
            .child(
                SimObject::new(RuntimeId::new(0, 2), "pad")
                    .prefab(4)
                    .with(pad_anchor),
            )
            .child(SimObject::new(RuntimeId::new(0, 3), "sensor").with(teleporter))
    }

    fn teleport_target(tree: &SimObject) -> ComponentId {
        let mut found = None;
        tree.visit(&mut |o| {
            if let Some((_, def)) = o.detector() {
                if let DetectorResponse::Teleport { target } = def.response {
                    found = Some(target);
                }
            }
        });
        found.expect("detector present")
    }

    #[test]
    fn instantiation_assigns_fresh_preorder_ids() {
        let template = template_with_teleporter();
        let mut alloc = IdAlloc::new(5);
        let live = instantiate(&template, &mut alloc);
        assert_eq!(live.id, RuntimeId::new(5, 1));
        assert_eq!(live.children[0].id, RuntimeId::new(5, 2));
        assert_eq!(live.children[1].id, RuntimeId::new(5, 3));
        assert_eq!(live.children[0].prefab, Some(4));
        // template untouched
        assert_eq!(template.id, RuntimeId::new(0, 1));
    }

    #[test]
    fn internal_references_are_rewritten() {
        let template = template_with_teleporter();
        let mut alloc = IdAlloc::new(7);
        let live = instantiate(&template, &mut alloc);
        let target = teleport_target(&live);
        assert_eq!(target.world(), 7);
        // points at the cloned anchor, which must exist in the live tree
        assert!(live.find_component(target).is_some());
    }

    #[test]
    fn external_references_are_preserved() {
        let mut template = template_with_teleporter();
        // retarget the teleporter at a component that is not in the subtree
        let outside = ComponentId::new(3, 99);
        for child in &mut template.children {
            for c in &mut child.components {
                if let ComponentData::Detector(def) = &mut c.data {
                    def.response = DetectorResponse::Teleport { target: outside };
                }
            }
        }
        let mut alloc = IdAlloc::new(8);
        let live = instantiate(&template, &mut alloc);
        assert_eq!(teleport_target(&live), outside);
    }

    #[test]
    fn repeated_spawns_never_share_ids() {
        let template = template_with_teleporter();
        let mut alloc = IdAlloc::new(2);
        let a = instantiate(&template, &mut alloc);
        let b = instantiate(&template, &mut alloc);
        let mut objects = std::collections::BTreeSet::new();
        let mut components = std::collections::BTreeSet::new();
        for tree in [&a, &b] {
            tree.visit(&mut |o| {
                assert!(objects.insert(o.id), "duplicate object id {}", o.id);
                for c in &o.components {
                    assert!(components.insert(c.id), "duplicate component id {}", c.id);
                }
            });
        }
    }
}

//! Pair filtering and mass-weighted collision response, shared by both integrators.

use slotmap::SlotMap;

use crate::api::Entity;
use crate::context::SimContext;
use crate::types::*;

/// Narrow-phase test between two entities' shapes. Empty if either has none.
pub fn collide<E: Entity>(a: &E, b: &E) -> CollisionData {
    match (a.shape(), b.shape()) {
        (Some(sa), Some(sb)) => sa.collide(a.pose(), sb, b.pose()),
        _ => CollisionData::EMPTY,
    }
}

/// Whether a touching pair should react at all.
pub fn accepts<E: Entity>(a: &E, b: &E) -> bool {
    let (fa, fb) = (a.flags(), b.flags());
    if fa.ghost || fb.ghost {
        return false;
    }
    if !fa.initiate_collision && !fb.initiate_collision {
        return false;
    }
    a.can_collide_with(b) && b.can_collide_with(a)
}

/// Test the pair `(ka, kb)` and, if they touch and pass filtering, apply the
/// response and notify both sides. Returns whether a collision was resolved.
pub(crate) fn check_collision_between<E: Entity>(
    ka: EntityKey,
    kb: EntityKey,
    entities: &mut SlotMap<EntityKey, E>,
    cfg: &IntegratorConfig,
    ctx: &mut SimContext,
    stats: &mut IntegratorStats,
) -> bool {
    let (Some(a), Some(b)) = (entities.get(ka), entities.get(kb)) else {
        return false;
    };
    stats.pair_tests += 1;
    let data = collide(a, b);
    if !data.is_valid() || !accepts(a, b) {
        return false;
    }
    let Some([a, b]) = entities.get_disjoint_mut([ka, kb]) else {
        return false;
    };
    let data = data.with_entities(ka, kb);
    resolve(a, b, data, cfg.mass_ratio_limit);
    a.after_collision_with(kb, &data, ctx);
    b.after_collision_with(ka, &data.flipped(), ctx);
    stats.collisions += 1;
    true
}

/// Mass-ratio-gated response. `data.normal` points from `b` toward `a`.
///
/// Within `mass_ratio_limit` both bodies share the separation and exchange momentum;
/// beyond it the heavier (or mover-less) body is treated as immovable.
pub fn resolve<E: Entity>(a: &mut E, b: &mut E, data: CollisionData, mass_ratio_limit: f32) {
    let (ma, mb) = (a.mass(), b.mass());
    let ratio = if ma.min(mb) > 0.0 {
        ma.max(mb) / ma.min(mb)
    } else {
        f32::INFINITY
    };
    let a_moves = a.mover().is_some();
    let b_moves = b.mover().is_some();

    if a_moves && b_moves && ratio <= mass_ratio_limit {
        let mut pa = a.position();
        let mut pb = b.position();
        let lost = match (a.mover_mut(), b.mover_mut()) {
            (Some(mva), Some(mvb)) => {
                mva.respond_to_collision(&mut pa, &data, 0.5);
                mvb.respond_to_collision(&mut pb, &data, -0.5);
                mva.transfer_energy(ma, mvb, mb, data.normal)
            }
            _ => 0.0,
        };
        a.set_position(pa);
        b.set_position(pb);
        a.absorb_energy(lost * 0.5);
        b.absorb_energy(lost * 0.5);
    } else if a_moves && (!b_moves || ma <= mb) {
        respond_one_sided(a, &data);
    } else if b_moves {
        respond_one_sided(b, &data.flipped());
    }
}

/// Full separation plus a bounce for `e` against an immovable obstacle.
/// `data.normal` points from the obstacle toward `e`.
fn respond_one_sided<E: Entity>(e: &mut E, data: &CollisionData) {
    let mass = e.mass();
    let mut position = e.position();
    let lost = match e.mover_mut() {
        Some(mover) => {
            mover.respond_to_collision(&mut position, data, 1.0);
            mover.bounce(mass, data.normal)
        }
        None => return,
    };
    e.set_position(position);
    e.absorb_energy(lost);
}

//! Box-layout arithmetic.
//!
//! Space along a box's axis is split in two passes: every visible child
//! gets an equal share capped at its preferred size, then the surplus
//! left by small children is handed out iteratively to children whose
//! preference exceeded their share, until the surplus runs dry or nobody
//! needs more. Integer math throughout.

use crate::Px;

/// Distribute `total` pixels among children with the given preferred
/// sizes. Returns one size per child; the sizes never exceed the
/// preference and sum to at most `total`.
pub fn distribute(total: Px, prefers: &[Px]) -> Vec<Px> {
    let n = prefers.len() as Px;
    if n == 0 {
        return Vec::new();
    }

    let equal = total / n;
    let mut sides: Vec<Px> = prefers.iter().map(|&p| p.min(equal)).collect();

    let mut surplus: Px = 0;
    let mut n_need: Px = 0;
    for &p in prefers {
        if p < equal {
            surplus += equal - p;
        } else if p > equal {
            n_need += 1;
        }
    }

    while n_need > 0 {
        let equal_surplus = surplus / n_need;
        if equal_surplus == 0 {
            break;
        }
        for (side, &prefer) in sides.iter_mut().zip(prefers) {
            let deficit = prefer - *side;
            if deficit > 0 {
                let add = equal_surplus.min(deficit);
                *side += add;
                surplus -= add;
                if prefer - *side == 0 {
                    n_need -= 1;
                }
            }
        }
    }

    sides
}

/// Running offsets for children laid out with [`distribute`].
pub fn offsets(sides: &[Px]) -> Vec<Px> {
    let mut out = Vec::with_capacity(sides.len());
    let mut at = 0;
    for &s in sides {
        out.push(at);
        at += s;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_empty() {
        assert!(distribute(100, &[]).is_empty());
    }

    #[test]
    fn everyone_fits() {
        assert_eq!(distribute(100, &[10, 20, 30]), vec![10, 20, 30]);
    }

    #[test]
    fn equal_split_when_all_hungry() {
        assert_eq!(distribute(90, &[100, 100, 100]), vec![30, 30, 30]);
    }

    #[test]
    fn surplus_flows_to_needy() {
        // equal = 30; the 5-wide child leaves 25 of surplus, split 12+12
        // with 1 pixel of slack left once the integer share hits zero.
        let sides = distribute(90, &[5, 100, 100]);
        assert_eq!(sides, vec![5, 42, 42]);
    }

    #[test]
    fn surplus_stops_at_preference() {
        // One child needs just a little more than equal; the rest of the
        // surplus stays undistributed.
        let sides = distribute(90, &[5, 35, 10]);
        assert_eq!(sides, vec![5, 35, 10]);
    }

    #[test]
    fn never_exceeds_total() {
        for total in [0, 1, 7, 80, 1000] {
            for prefers in [&[1, 1, 1][..], &[50, 0, 200], &[1000, 1000]] {
                let sides = distribute(total, prefers);
                assert!(sides.iter().sum::<Px>() <= total.max(0));
            }
        }
    }

    #[test]
    fn offsets_accumulate() {
        assert_eq!(offsets(&[10, 20, 5]), vec![0, 10, 30]);
    }
}

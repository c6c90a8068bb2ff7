//! Mixed-radix broadcast codec
//!
//! A message is one integer in a mixed radix, least significant field first:
//!
//! ```text
//! value = group + 3·(ball + B·(p1 + P1·(p2 + P2·(...))))
//! ```
//!
//! where `B` and `Pi` are the field cardinalities. The integer is written in the
//! alphabet's base, least significant symbol first; the first symbol uses base 88
//! so a message never starts with `;`.

use super::alphabet::{self, BASE, FIRST_BASE, MAX_MESSAGE_LEN};
use super::grid::{BallGrid, PlayerGrid, PlayerReport};
use super::groups::{BroadcastGroup, GROUPS};
use super::wide::WideUint;
use crate::config::RadioConfig;
use crate::error::{Error, Result};
use crate::world::EntityRef;

/// Broadcast payload, 1 to 20 alphabet symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(Vec<u8>);

impl EncodedMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        // alphabet is ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

/// Contents of a decoded message
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub group: usize,
    pub ball: Option<[f32; 3]>,
    pub players: Vec<(EntityRef, PlayerReport)>,
}

/// Encoder/decoder for the three broadcast groups
#[derive(Debug, Clone)]
pub struct RadioCodec {
    teammate: PlayerGrid,
    opponent: PlayerGrid,
    ball: BallGrid,
}

impl RadioCodec {
    /// Build the codec, rejecting grids whose largest message would not fit in
    /// twenty symbols.
    pub fn new(config: &RadioConfig) -> Result<Self> {
        let codec = Self {
            teammate: PlayerGrid::new(&config.teammate_grid)?,
            opponent: PlayerGrid::new(&config.opponent_grid)?,
            ball: BallGrid::new(&config.ball_grid)?,
        };

        let capacity = message_capacity();
        for (idx, group) in GROUPS.iter().enumerate() {
            let fits = codec
                .group_cardinality(group)
                .is_some_and(|total| total <= capacity);
            if !fits {
                return Err(Error::InvalidConfig(format!(
                    "radio grids too fine: group {} does not fit in {} symbols",
                    idx, MAX_MESSAGE_LEN
                )));
            }
        }
        Ok(codec)
    }

    fn player_grid(&self, entity: EntityRef) -> &PlayerGrid {
        match entity {
            EntityRef::Teammate(_) => &self.teammate,
            EntityRef::Opponent(_) => &self.opponent,
        }
    }

    /// Product of all field cardinalities of a group, group index included
    fn group_cardinality(&self, group: &BroadcastGroup) -> Option<WideUint> {
        let mut total = WideUint::from_u64(GROUPS.len() as u64);
        if group.carries_ball {
            total = total.checked_mul_add(self.ball.cardinality(), 0)?;
        }
        for &member in group.members {
            total = total.checked_mul_add(self.player_grid(member).cardinality(), 0)?;
        }
        Some(total)
    }

    /// Encode one group; `players` follows the group's member order.
    pub fn encode(
        &self,
        group_idx: usize,
        ball: Option<[f32; 2]>,
        players: &[PlayerReport],
    ) -> Result<EncodedMessage> {
        let group = GROUPS
            .get(group_idx)
            .ok_or_else(|| Error::Other(format!("no broadcast group {}", group_idx)))?;
        if players.len() != group.members.len() {
            return Err(Error::Other(format!(
                "group {} has {} members, got {} reports",
                group_idx,
                group.members.len(),
                players.len()
            )));
        }

        let mut fields: Vec<(u32, u32)> = Vec::with_capacity(players.len() + 1);
        if group.carries_ball {
            let pos = ball.ok_or_else(|| {
                Error::Other(format!("group {} needs a ball position", group_idx))
            })?;
            fields.push((self.ball.encode(pos), self.ball.cardinality()));
        }
        for (&member, &report) in group.members.iter().zip(players) {
            let grid = self.player_grid(member);
            fields.push((grid.encode(report), grid.cardinality()));
        }

        let overflow = || Error::Other("broadcast value overflow".into());
        let mut value = WideUint::ZERO;
        for &(combination, cardinality) in fields.iter().rev() {
            value = value
                .checked_mul_add(cardinality, combination)
                .ok_or_else(overflow)?;
        }
        value = value
            .checked_mul_add(GROUPS.len() as u32, group_idx as u32)
            .ok_or_else(overflow)?;

        let (mut value, first) = value.div_rem(FIRST_BASE);
        let mut out = vec![alphabet::symbol(first)];
        while !value.is_zero() {
            let (rest, d) = value.div_rem(BASE);
            out.push(alphabet::symbol(d));
            value = rest;
        }
        debug_assert!(out.len() <= MAX_MESSAGE_LEN);
        Ok(EncodedMessage(out))
    }

    /// Decode a payload heard from a teammate
    pub fn decode(&self, payload: &[u8]) -> Result<DecodedMessage> {
        let reject = |why: String| Err(Error::RadioDecode(why));
        if payload.is_empty() || payload.len() > MAX_MESSAGE_LEN {
            return reject(format!("bad length {}", payload.len()));
        }

        let mut digits = Vec::with_capacity(payload.len());
        for &b in payload {
            match alphabet::digit(b) {
                Some(d) => digits.push(d),
                None => return reject(format!("byte 0x{:02x} outside the alphabet", b)),
            }
        }
        if digits[0] >= FIRST_BASE {
            return reject("message starts with the reserved symbol".into());
        }

        let mut value = WideUint::ZERO;
        for &d in digits[1..].iter().rev() {
            value = value
                .checked_mul_add(BASE, d)
                .ok_or_else(|| Error::RadioDecode("value overflow".into()))?;
        }
        value = value
            .checked_mul_add(FIRST_BASE, digits[0])
            .ok_or_else(|| Error::RadioDecode("value overflow".into()))?;

        let (mut value, group_idx) = value.div_rem(GROUPS.len() as u32);
        let group_idx = group_idx as usize;
        let group = &GROUPS[group_idx];

        let mut ball = None;
        if group.carries_ball {
            let (rest, combination) = value.div_rem(self.ball.cardinality());
            ball = self.ball.decode(combination);
            value = rest;
        }

        let mut players = Vec::with_capacity(group.members.len());
        for &member in group.members {
            let grid = self.player_grid(member);
            let (rest, combination) = value.div_rem(grid.cardinality());
            if let Some(report) = decode_field(grid, member, combination) {
                players.push((member, report));
            }
            value = rest;
        }

        if !value.is_zero() {
            return reject(format!("leftover value after group {}", group_idx));
        }
        Ok(DecodedMessage {
            group: group_idx,
            ball,
            players,
        })
    }
}

/// One player field; a bad combination drops only that member's update
fn decode_field(grid: &PlayerGrid, member: EntityRef, combination: u32) -> Option<PlayerReport> {
    let report = grid.decode(combination);
    if report.is_none() {
        log::warn!("Dropping radio field {} for {:?}", combination, member);
    }
    report
}

/// Number of values twenty symbols can carry: `88 · 89^19`
fn message_capacity() -> WideUint {
    let mut capacity = WideUint::from_u64(u64::from(FIRST_BASE));
    for _ in 1..MAX_MESSAGE_LEN {
        // 88 · 89^19 < 2^160
        capacity = capacity.checked_mul_add(BASE, 0).unwrap_or(capacity);
    }
    capacity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn codec() -> RadioCodec {
        RadioCodec::new(&RadioConfig::default()).unwrap()
    }

    fn at(x: f32, y: f32, fallen: bool) -> PlayerReport {
        PlayerReport::At { pos: [x, y], fallen }
    }

    fn arb_report() -> impl Strategy<Value = PlayerReport> {
        prop_oneof![
            Just(PlayerReport::Unknown),
            Just(PlayerReport::OutOfBounds),
            // on the grid
            (-16.0f32..=16.0, -11.0f32..=11.0, any::<bool>())
                .prop_map(|(x, y, fallen)| at(x, y, fallen)),
            // beyond the clamping margin
            (17.5f32..40.0, -30.0f32..30.0, any::<bool>(), any::<bool>())
                .prop_map(|(x, y, fallen, west)| at(if west { -x } else { x }, y, fallen)),
        ]
    }

    fn arb_group() -> impl Strategy<Value = (usize, [f32; 2], Vec<PlayerReport>)> {
        (0..GROUPS.len()).prop_flat_map(|group| {
            (
                Just(group),
                (-15.0f32..=15.0, -10.0f32..=10.0).prop_map(|(x, y)| [x, y]),
                prop::collection::vec(arb_report(), GROUPS[group].members.len()),
            )
        })
    }

    /// Half a cell plus float slack
    fn tolerance(cells_per_meter: f32) -> f32 {
        0.5 / cells_per_meter + 1e-3
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_every_group_round_trips_within_half_a_cell((group, ball, reports) in arb_group()) {
            let config = RadioConfig::default();
            let codec = RadioCodec::new(&config).unwrap();
            let ball = GROUPS[group].carries_ball.then_some(ball);
            let msg = codec.encode(group, ball, &reports).unwrap();

            prop_assert!(!msg.is_empty() && msg.len() <= MAX_MESSAGE_LEN);
            prop_assert_ne!(msg.as_bytes()[0], b';');
            prop_assert!(msg.as_bytes().iter().all(|b| alphabet::digit(*b).is_some()));

            let decoded = codec.decode(msg.as_bytes()).unwrap();
            prop_assert_eq!(decoded.group, group);
            match (ball, decoded.ball) {
                (Some(sent), Some(got)) => {
                    let res = &config.ball_grid;
                    prop_assert!((sent[0] - got[0]).abs() <= tolerance(res.cells_per_meter_x));
                    prop_assert!((sent[1] - got[1]).abs() <= tolerance(res.cells_per_meter_y));
                }
                (None, None) => {}
                (sent, got) => prop_assert!(false, "ball {:?} decoded as {:?}", sent, got),
            }

            prop_assert_eq!(decoded.players.len(), reports.len());
            let expected = GROUPS[group].members.iter().zip(&reports);
            for (&(member, got), (&owner, &sent)) in decoded.players.iter().zip(expected) {
                prop_assert_eq!(member, owner);
                let res = match member {
                    EntityRef::Teammate(_) => &config.teammate_grid,
                    EntityRef::Opponent(_) => &config.opponent_grid,
                };
                match (sent, got) {
                    (PlayerReport::At { pos, .. }, _)
                        if pos[0].abs() > res.half_length + 1.0
                            || pos[1].abs() > res.half_width + 1.0 =>
                    {
                        prop_assert_eq!(got, PlayerReport::OutOfBounds);
                    }
                    (
                        PlayerReport::At { pos, fallen },
                        PlayerReport::At { pos: got_pos, fallen: got_fallen },
                    ) => {
                        prop_assert_eq!(got_fallen, fallen);
                        prop_assert!((pos[0] - got_pos[0]).abs() <= tolerance(res.cells_per_meter_x));
                        prop_assert!((pos[1] - got_pos[1]).abs() <= tolerance(res.cells_per_meter_y));
                    }
                    (sent, got) => prop_assert_eq!(got, sent),
                }
            }
        }

        #[test]
        fn test_decode_never_panics(payload in prop::collection::vec(any::<u8>(), 0..32)) {
            let _ = codec().decode(&payload);
        }

        #[test]
        fn test_decoded_alphabet_payload_covers_the_group(
            digits in prop::collection::vec(0..FIRST_BASE, 1..=MAX_MESSAGE_LEN)
        ) {
            let payload: Vec<u8> = digits.into_iter().map(alphabet::symbol).collect();
            if let Ok(decoded) = codec().decode(&payload) {
                let members = GROUPS[decoded.group].members;
                prop_assert_eq!(decoded.players.len(), members.len());
                prop_assert_eq!(decoded.ball.is_some(), GROUPS[decoded.group].carries_ball);
            }
        }
    }

    #[test]
    fn test_all_groups_round_trip() {
        let codec = codec();
        let group0 = [
            at(-3.2, 4.1, false),
            at(15.9, -10.9, true),
            PlayerReport::Unknown,
            at(0.0, 0.0, false),
            PlayerReport::OutOfBounds,
            at(-16.0, 11.0, true),
            at(7.04, 2.2, false),
        ];
        let msg = codec.encode(0, Some([1.23, -4.56]), &group0).unwrap();
        let decoded = codec.decode(msg.as_bytes()).unwrap();
        assert_eq!(decoded.group, 0);

        let ball = decoded.ball.unwrap();
        assert_relative_eq!(ball[0], 1.2, epsilon = 1e-4);
        assert_relative_eq!(ball[1], -4.6, epsilon = 1e-4);
        assert_eq!(decoded.players.len(), 7);
        assert_eq!(decoded.players[0].0, EntityRef::Teammate(10));
        assert_eq!(decoded.players[2], (EntityRef::Opponent(7), PlayerReport::Unknown));
        assert_eq!(decoded.players[4], (EntityRef::Opponent(9), PlayerReport::OutOfBounds));
        let PlayerReport::At { pos, fallen } = decoded.players[1].1 else {
            panic!("expected a position");
        };
        assert!(fallen);
        assert_relative_eq!(pos[0], 15.9, epsilon = 1e-4);
        assert_relative_eq!(pos[1], -10.9, epsilon = 1e-4);

        let group1: Vec<_> = (0..7).map(|i| at(i as f32, -(i as f32), i % 2 == 0)).collect();
        let decoded = codec.decode(codec.encode(1, None, &group1).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.group, 1);
        assert!(decoded.ball.is_none());
        assert_eq!(decoded.players[6], (EntityRef::Teammate(7), at(6.0, -6.0, true)));

        let group2 = [PlayerReport::Unknown; 8];
        let decoded = codec.decode(codec.encode(2, None, &group2).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.group, 2);
        assert!(decoded.players.iter().all(|(_, r)| *r == PlayerReport::Unknown));
    }

    #[test]
    fn test_worst_case_fits_twenty_symbols() {
        let codec = codec();
        // highest combination in every field
        let group0 = [PlayerReport::Unknown; 7];
        let msg = codec.encode(0, Some([15.0, 10.0]), &group0).unwrap();
        assert!(msg.len() <= MAX_MESSAGE_LEN);
        assert_ne!(msg.as_bytes()[0], b';');
        assert!(msg.as_bytes().iter().all(|b| alphabet::digit(*b).is_some()));

        let group2 = [PlayerReport::Unknown; 8];
        assert!(codec.encode(2, None, &group2).unwrap().len() <= MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_minimal_message_is_one_symbol() {
        let codec = codec();
        let group1 = [at(-16.0, -11.0, false); 7];
        // every field at combination 0, group 1
        let msg = codec.encode(1, None, &group1).unwrap();
        assert_eq!(msg.as_str(), "#");
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        let codec = codec();
        assert!(matches!(codec.decode(b""), Err(Error::RadioDecode(_))));
        assert!(matches!(codec.decode(&[b'a'; 21]), Err(Error::RadioDecode(_))));
        assert!(matches!(codec.decode(b"ab cd"), Err(Error::RadioDecode(_))));
        assert!(matches!(codec.decode(b";abc"), Err(Error::RadioDecode(_))));
        // twenty top symbols exceed every group's cardinality
        assert!(matches!(codec.decode(&[b'~'; 20]), Err(Error::RadioDecode(_))));
    }

    #[test]
    fn test_rejects_wrong_report_count() {
        let codec = codec();
        assert!(codec.encode(1, None, &[PlayerReport::Unknown; 3]).is_err());
        assert!(codec.encode(0, None, &[PlayerReport::Unknown; 7]).is_err());
        assert!(codec.encode(3, None, &[]).is_err());
    }

    #[test]
    fn test_bad_field_drops_only_that_member() {
        let codec = codec();
        let grid = codec.player_grid(EntityRef::Opponent(3));
        assert_eq!(
            decode_field(grid, EntityRef::Opponent(3), grid.cardinality()),
            None
        );
        assert_eq!(
            decode_field(grid, EntityRef::Opponent(3), grid.cardinality() - 1),
            Some(PlayerReport::Unknown)
        );
    }

    #[test]
    fn test_oversized_grid_config_is_rejected() {
        let mut config = RadioConfig::default();
        config.teammate_grid.cells_per_meter_x = 2000.0;
        config.teammate_grid.cells_per_meter_y = 2000.0;
        assert!(matches!(RadioCodec::new(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_capacity_validation() {
        let mut config = RadioConfig::default();
        config.opponent_grid = GridConfig {
            cells_per_meter_x: 10.0,
            cells_per_meter_y: 10.0,
            ..GridConfig::opponent_defaults()
        };
        assert!(matches!(RadioCodec::new(&config), Err(Error::InvalidConfig(_))));
    }
}

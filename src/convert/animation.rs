use log::info;

use crate::{
    model::{Animation, Channel, PositionKey, RotationKey, ScaleKey},
    scene::{NodeAnimation, SourceAnimation},
};

/// Convert every source track to second-based timing.
///
/// `default_ticks_per_second` replaces a reported rate of zero.
pub(super) fn extract_animations(
    animations: &[SourceAnimation],
    default_ticks_per_second: f64,
) -> Vec<Animation> {
    animations
        .iter()
        .enumerate()
        .map(|(index, animation)| convert_animation(index, animation, default_ticks_per_second))
        .collect()
}

fn convert_animation(index: usize, source: &SourceAnimation, default_tps: f64) -> Animation {
    let ticks_per_second = if source.ticks_per_second > 0.0 {
        source.ticks_per_second
    } else {
        default_tps
    };
    let name = if source.name.is_empty() {
        format!("animation{index}")
    } else {
        source.name.clone()
    };
    info!("Animation found: {name}");

    Animation {
        length: source.duration_ticks / ticks_per_second,
        channels: source
            .channels
            .iter()
            .map(|channel| convert_channel(channel, ticks_per_second))
            .collect(),
        name,
    }
}

fn convert_channel(channel: &NodeAnimation, ticks_per_second: f64) -> Channel {
    info!("Found animation for node {}", channel.node);
    Channel {
        name: channel.node.clone(),
        positions: channel
            .positions
            .iter()
            .map(|key| PositionKey {
                time: key.time / ticks_per_second,
                pos: key.value,
            })
            .collect(),
        scales: channel
            .scales
            .iter()
            .map(|key| ScaleKey {
                time: key.time / ticks_per_second,
                scale: key.value,
            })
            .collect(),
        rotations: channel
            .rotations
            .iter()
            .map(|key| RotationKey {
                time: key.time / ticks_per_second,
                rot: key.value,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{QuatKey, VectorKey};

    fn walk(ticks_per_second: f64) -> SourceAnimation {
        SourceAnimation {
            name: "walk".to_string(),
            duration_ticks: 100.0,
            ticks_per_second,
            channels: vec![NodeAnimation {
                node: "hips".to_string(),
                positions: vec![VectorKey {
                    time: 50.0,
                    value: [0.0, 1.0, 0.0],
                }],
                scales: Vec::new(),
                rotations: vec![
                    QuatKey {
                        time: 0.0,
                        value: [0.0, 0.0, 0.0, 1.0],
                    },
                    QuatKey {
                        time: 25.0,
                        value: [0.0, 1.0, 0.0, 0.0],
                    },
                ],
            }],
        }
    }

    #[test]
    fn given_tick_fifty_at_twenty_five_tps_when_extracting_then_time_is_two_seconds() {
        let animations = extract_animations(&[walk(25.0)], 25.0);

        let channel = &animations[0].channels[0];
        assert_eq!(channel.name, "hips");
        assert_eq!(channel.positions[0].time, 2.0);
        assert_eq!(channel.rotations[1].time, 1.0);
        assert_eq!(channel.rotations[1].rot, [0.0, 1.0, 0.0, 0.0]);
        assert!(channel.scales.is_empty());
        assert_eq!(animations[0].length, 4.0);
    }

    #[test]
    fn given_zero_tps_when_extracting_then_default_rate_is_used() {
        let animations = extract_animations(&[walk(0.0)], 25.0);
        assert_eq!(animations[0].length, 4.0);

        let custom = extract_animations(&[walk(0.0)], 50.0);
        assert_eq!(custom[0].length, 2.0);
    }

    #[test]
    fn given_unnamed_track_when_extracting_then_index_name_is_assigned() {
        let mut unnamed = walk(25.0);
        unnamed.name.clear();

        let animations = extract_animations(&[walk(25.0), unnamed], 25.0);

        assert_eq!(animations[0].name, "walk");
        assert_eq!(animations[1].name, "animation1");
    }
}

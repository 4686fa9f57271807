//! TV game-mode toggling through the on-screen menu

use crate::config::MenuKeys;
use crate::convergence::{pause, Device};
use crate::macros::MacroContext;
use crate::outcome::{MacroState, StepOutcome};

/// Menu navigation to the game-mode switch; the paths differ in one direction
pub fn key_sequence(keys: &MenuKeys, enable: bool) -> Vec<&str> {
    let toggle = if enable { &keys.right } else { &keys.left };
    [
        &keys.menu,
        &keys.down,
        &keys.down,
        &keys.down,
        &keys.enter,
        &keys.down,
        &keys.down,
        toggle,
        &keys.enter,
        &keys.back,
        &keys.back,
    ]
    .into_iter()
    .map(String::as_str)
    .collect()
}

pub(crate) async fn set_game_mode(ctx: &MacroContext<'_>, enable: bool) -> MacroState {
    let Some(tv) = Device::lookup(ctx.devices, &ctx.config.tv) else {
        return MacroState::Converged;
    };

    ctx.status.status(if enable {
        "Enabling game mode"
    } else {
        "Disabling game mode"
    });

    let keys = key_sequence(&ctx.config.tv_profile.keys, enable);
    let last = keys.len().saturating_sub(1);
    for (index, key) in keys.into_iter().enumerate() {
        match tv.command(key, &ctx.cancel).await {
            StepOutcome::Ok => {}
            StepOutcome::Failed(reason) => {
                tracing::warn!("{}: menu key {} failed: {}", tv.key(), key, reason);
            }
            StepOutcome::Cancelled => return MacroState::Cancelled,
        }

        if index < last && !pause(ctx.config.game_mode_key_delay, &ctx.cancel).await {
            return MacroState::Cancelled;
        }
    }

    MacroState::Converged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_differ_in_one_direction() {
        let keys = MenuKeys::default();
        let on = key_sequence(&keys, true);
        let off = key_sequence(&keys, false);

        assert_eq!(on.len(), off.len());
        let differences: Vec<_> = on.iter().zip(&off).filter(|(a, b)| a != b).collect();
        assert_eq!(differences, vec![(&"KeyRight", &"KeyLeft")]);
        assert_eq!(on.first(), Some(&"KeyMenu"));
    }

    #[test]
    fn test_every_menu_key_is_driven() {
        let keys = MenuKeys::default();
        let mut used = key_sequence(&keys, true);
        used.extend(key_sequence(&keys, false));

        for key in [&keys.menu, &keys.down, &keys.left, &keys.right, &keys.enter, &keys.back] {
            assert!(used.contains(&key.as_str()), "{key} never sent");
        }
    }
}

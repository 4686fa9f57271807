//! Power, input and lighting macros
//!
//! Each macro is a staged set of concurrent device operations with explicit
//! join points. Device failures are folded into step outcomes and never abort
//! the macro; only cancellation stops it early.

use device_manager::ConnectionRegistry;
use device_model::Value;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{OrchestratorConfig, PowerProfile, SourceDevice};
use crate::convergence::{ensure_device_state, pause, ConvergenceReport, Device, StateTarget};
use crate::outcome::{MacroState, MacroTally, StepOutcome};
use crate::status::StatusReporter;

/// Everything a running macro can reach
pub(crate) struct MacroContext<'a> {
    pub config: &'a OrchestratorConfig,
    pub devices: &'a ConnectionRegistry,
    pub status: &'a StatusReporter,
    /// Cancelled on shutdown or when the macro times out
    pub cancel: CancellationToken,
    /// Outlives the macro; background work started by a macro stops on shutdown only
    pub background: CancellationToken,
}

/// Power on a source and everything it needs, with the AVR switched to its input
pub(crate) async fn turn_on(ctx: &MacroContext<'_>, source: &SourceDevice) -> MacroState {
    let config = ctx.config;
    let mut tally = MacroTally::new();

    let target = Device::lookup(ctx.devices, &source.key);
    let avr = Device::lookup(ctx.devices, &config.avr);
    let tv = Device::lookup(ctx.devices, &config.tv);

    ctx.status.status(format!("{}: checking power", source.name));
    let probes = [
        (target.as_ref(), &source.power.query),
        (avr.as_ref(), &config.avr_profile.power.query),
        (tv.as_ref(), &config.tv_profile.power.query),
    ];
    let probed = join_all(
        probes
            .iter()
            .filter_map(|(device, query)| device.map(|d| d.query(query, &ctx.cancel))),
    )
    .await;
    // Probe failures only mean the power state stays unknown
    probed.iter().for_each(|outcome| tally.record_step(outcome));

    let probe_delay = [&target, &avr, &tv]
        .into_iter()
        .flatten()
        .map(|d| d.handler.default_command_delay())
        .max()
        .unwrap_or_default();
    if tally.is_cancelled() || !pause(probe_delay, &ctx.cancel).await {
        return MacroState::Cancelled;
    }

    ctx.status.status(format!("{}: powering AVR and TV", source.name));
    let avr_power = async {
        match &avr {
            Some(avr) => {
                let target = config.avr_profile.power.turned_on();
                Some(ensure_device_state(avr, &target, &config.policies.power, &ctx.cancel).await)
            }
            None => None,
        }
    };
    let tv_power = async {
        match &tv {
            Some(tv) => turn_on_if_off(tv, &config.tv_profile.power, &ctx.cancel).await,
            None => false,
        }
    };
    let (avr_power, tv_turned_on) = tokio::join!(avr_power, tv_power);

    if let Some(report) = &avr_power {
        tally.record(report);
    }
    let avr_changed = avr_power.as_ref().is_some_and(ConvergenceReport::changed);

    let settle = [
        avr.as_ref().filter(|_| avr_changed),
        tv.as_ref().filter(|_| tv_turned_on),
    ]
    .into_iter()
    .flatten()
    .map(|d| d.handler.power_on_delay())
    .max()
    .unwrap_or_default();
    if tally.is_cancelled() || !pause(settle, &ctx.cancel).await {
        return MacroState::Cancelled;
    }

    let mut input_changed = false;
    if let Some(avr) = &avr {
        ctx.status.status(format!("{}: selecting input {}", source.name, source.avr_input));
        let report = ensure_device_state(
            avr,
            &input_target(config, source),
            &config.policies.input,
            &ctx.cancel,
        )
        .await;
        tally.record(&report);
        input_changed = report.changed();
    }
    if tally.is_cancelled() {
        return MacroState::Cancelled;
    }

    spawn_sibling_shutdown(ctx, source);

    if let Some(avr) = avr.as_ref().filter(|_| avr_changed || input_changed) {
        ctx.status.status(format!("{}: applying AVR defaults", source.name));
        let reports = join_all(config.avr_defaults.iter().map(|setting| async move {
            let target = setting.target();
            ensure_device_state(avr, &target, &config.policies.settings, &ctx.cancel).await
        }))
        .await;
        reports.iter().for_each(|report| tally.record(report));
        if tally.is_cancelled() {
            return MacroState::Cancelled;
        }
    }

    if let Some(target) = &target {
        ctx.status.status(format!("{}: powering on", source.name));
        let report = ensure_device_state(
            target,
            &source.power.turned_on(),
            &config.policies.power,
            &ctx.cancel,
        )
        .await;
        tally.record(&report);
    }

    if let (Some(mode), Some(key)) = (&source.lighting_mode, &config.lighting) {
        if let Some(lighting) = Device::lookup(ctx.devices, key) {
            tally.record_step(&lighting.command(mode, &ctx.cancel).await);
        }
    }

    tally.state()
}

/// Point the AVR at a source without any power sequencing
pub(crate) async fn switch_input(ctx: &MacroContext<'_>, source: &SourceDevice) -> MacroState {
    let Some(avr) = Device::lookup(ctx.devices, &ctx.config.avr) else {
        return MacroState::Converged;
    };

    ctx.status.status(format!("Selecting input {}", source.avr_input));
    let mut tally = MacroTally::new();
    let report = ensure_device_state(
        &avr,
        &input_target(ctx.config, source),
        &ctx.config.policies.input,
        &ctx.cancel,
    )
    .await;
    tally.record(&report);
    tally.state()
}

/// Power everything off; the AVR and the lighting box go last
pub(crate) async fn turn_off_everything(ctx: &MacroContext<'_>) -> MacroState {
    let config = ctx.config;
    let mut tally = MacroTally::new();

    ctx.status.status("Turning off sources and TV");
    let mut peripherals: Vec<(Device, &PowerProfile)> = config
        .sources
        .iter()
        .filter_map(|s| Device::lookup(ctx.devices, &s.key).map(|d| (d, &s.power)))
        .collect();
    if let Some(tv) = Device::lookup(ctx.devices, &config.tv) {
        peripherals.push((tv, &config.tv_profile.power));
    }

    let outcomes = join_all(
        peripherals
            .iter()
            .map(|(device, power)| power_off(device, power, &ctx.cancel)),
    )
    .await;
    outcomes.iter().for_each(|outcome| tally.record_step(outcome));
    if tally.is_cancelled() {
        return MacroState::Cancelled;
    }

    ctx.status.status("Turning off AVR and lighting");
    let avr = Device::lookup(ctx.devices, &config.avr);
    let lighting = config
        .lighting
        .as_ref()
        .and_then(|key| Device::lookup(ctx.devices, key));

    let avr_off = async {
        match &avr {
            Some(avr) => power_off(avr, &config.avr_profile.power, &ctx.cancel).await,
            None => StepOutcome::Ok,
        }
    };
    let lighting_off = async {
        match &lighting {
            Some(lighting) => {
                lighting
                    .command(&config.lighting_profile.power_off, &ctx.cancel)
                    .await
            }
            None => StepOutcome::Ok,
        }
    };
    let (avr_off, lighting_off) = tokio::join!(avr_off, lighting_off);
    tally.record_step(&avr_off);
    tally.record_step(&lighting_off);

    tally.state()
}

/// Toggle ambient-lighting sync
pub(crate) async fn lighting_sync(ctx: &MacroContext<'_>, enable: bool) -> MacroState {
    let Some(lighting) = ctx
        .config
        .lighting
        .as_ref()
        .and_then(|key| Device::lookup(ctx.devices, key))
    else {
        return MacroState::Converged;
    };

    let profile = &ctx.config.lighting_profile;
    let command = if enable { &profile.sync_on } else { &profile.sync_off };
    ctx.status.status(if enable {
        "Enabling lighting sync"
    } else {
        "Disabling lighting sync"
    });

    let mut tally = MacroTally::new();
    tally.record_step(&lighting.command(command, &ctx.cancel).await);
    tally.state()
}

fn input_target(config: &OrchestratorConfig, source: &SourceDevice) -> StateTarget {
    StateTarget::new(
        &config.avr_profile.input_feedback,
        source.avr_input.as_str(),
        &config.avr_profile.input_query,
        &source.input_command,
    )
}

/// Issue power-on unless the device is known to be on; power queries on some
/// devices are unreliable, so failures are ignored
async fn turn_on_if_off(device: &Device, power: &PowerProfile, cancel: &CancellationToken) -> bool {
    if device.value(&power.feedback) == Some(Value::Bool(true)) {
        return false;
    }
    device.command(&power.on, cancel).await.is_ok()
}

/// Power off, then re-query so the host sees the new state
async fn power_off(device: &Device, power: &PowerProfile, cancel: &CancellationToken) -> StepOutcome {
    let outcome = device.command(&power.off, cancel).await;
    if outcome.is_cancelled() {
        return outcome;
    }

    match device.query(&power.query, cancel).await {
        StepOutcome::Cancelled => StepOutcome::Cancelled,
        _ => outcome,
    }
}

/// Fire-and-forget power-off of every other source not known to be off
fn spawn_sibling_shutdown(ctx: &MacroContext<'_>, active: &SourceDevice) {
    let siblings: Vec<(Device, PowerProfile)> = ctx
        .config
        .sources
        .iter()
        .filter(|s| s.key != active.key)
        .filter_map(|s| {
            let (handler, provider) = ctx.devices.device(&s.key).ok()?;
            Some((Device { handler, provider }, s.power.clone()))
        })
        .filter(|(device, power)| device.value(&power.feedback) != Some(Value::Bool(false)))
        .collect();

    if siblings.is_empty() {
        return;
    }

    let cancel = ctx.background.child_token();
    tokio::spawn(async move {
        let outcomes = join_all(
            siblings
                .iter()
                .map(|(device, power)| power_off(device, power, &cancel)),
        )
        .await;
        tracing::debug!(
            "Sibling shutdown finished, {} of {} succeeded",
            outcomes.iter().filter(|o| o.is_ok()).count(),
            outcomes.len()
        );
    });
}

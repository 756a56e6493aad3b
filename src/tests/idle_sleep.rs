//! Testes dos hooks de idle/ISR e da decisão de light sleep

use super::{new_ctx, set_core, HwEvent, SimHal};
use crate::hal::PmHal;
use crate::mode::Mode;
use crate::{PmConfig, PmContext, PmLockKind};

#[test]
fn test_idle_releases_baseline_once() {
    let ctx = new_ctx(1, 160);
    ctx.configure(&PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 40,
        light_sleep_enable: false,
    })
    .unwrap();

    ctx.idle_hook();
    assert_eq!(ctx.mode(), Mode::ApbMin);
    assert_eq!(ctx.hal().cpu_frequency(), 40);

    // Segundo hook no mesmo período ocioso: sem efeito
    ctx.idle_hook();
    let st = ctx.state.lock(ctx.hal());
    assert_eq!(st.lock_counts[Mode::CpuMax.index()], 0);
    drop(st);
    let set_freqs = ctx
        .hal()
        .events()
        .iter()
        .filter(|e| matches!(e, HwEvent::SetFreq(_)))
        .count();
    assert_eq!(set_freqs, 1);
}

#[test]
fn test_isr_restores_baseline() {
    let ctx = new_ctx(1, 160);
    ctx.configure(&PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 40,
        light_sleep_enable: false,
    })
    .unwrap();
    ctx.idle_hook();
    assert_eq!(ctx.mode(), Mode::ApbMin);

    // Interrupção genérica: o core volta ao trabalho na frequência máxima
    ctx.isr_hook();
    assert_eq!(ctx.mode(), Mode::CpuMax);
    assert_eq!(ctx.hal().cpu_frequency(), 160);
}

#[test]
fn test_client_lock_stacks_with_baseline() {
    let ctx = new_ctx(1, 160);
    ctx.configure(&PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 40,
        light_sleep_enable: false,
    })
    .unwrap();
    ctx.idle_hook();

    // Cliente pede CPU_MAX com o core ocioso
    let lock = ctx.new_lock(PmLockKind::CpuFreqMax);
    lock.acquire().unwrap();
    assert_eq!(ctx.mode(), Mode::CpuMax);

    // A interrupção readquire o baseline por cima do lock do cliente
    ctx.isr_hook();
    assert_eq!(
        ctx.state.lock(ctx.hal()).lock_counts[Mode::CpuMax.index()],
        2
    );
    lock.release().unwrap();
    assert_eq!(ctx.mode(), Mode::CpuMax);
}

/// Deixa o contexto em LightSleep com tick de 100 Hz (período 10 ms)
fn sleeping_ctx() -> crate::PmContext<super::SimHal> {
    let ctx = new_ctx(1, 80);
    ctx.configure(&PmConfig {
        max_freq_mhz: 80,
        min_freq_mhz: 80,
        light_sleep_enable: true,
    })
    .unwrap();
    ctx.idle_hook();
    assert_eq!(ctx.mode(), Mode::LightSleep);
    ctx
}

#[test]
fn test_try_sleep_sleeps_and_steps_ticks() {
    let ctx = sleeping_ctx();
    ctx.hal().set_next_alarm_in(1_000_000);
    ctx.hal().clear_events();

    // 5 ticks ociosos a 100 Hz = 50 ms de orçamento
    assert!(ctx.try_sleep(5));

    let events = ctx.hal().events();
    // Acorda 100 us antes do fim do orçamento
    assert!(events.contains(&HwEvent::ArmWakeup(49_900)));
    assert!(events.contains(&HwEvent::EnterSleep));
    // 49.9 ms dormidos = 4 ticks inteiros repostos no scheduler
    assert!(events.contains(&HwEvent::StepTicks(4)));
}

#[test]
fn test_try_sleep_refuses_outside_light_sleep() {
    let ctx = new_ctx(1, 80);
    ctx.hal().set_next_alarm_in(1_000_000);
    assert_eq!(ctx.mode(), Mode::CpuMax);
    assert!(!ctx.try_sleep(5));
    assert!(!ctx.hal().events().contains(&HwEvent::EnterSleep));
}

#[test]
fn test_try_sleep_refuses_short_idle() {
    let ctx = sleeping_ctx();
    ctx.hal().set_next_alarm_in(1_000_000);

    // 1 tick de ociosidade fica abaixo do mínimo de 2
    assert!(!ctx.try_sleep(1));
    assert!(!ctx.hal().events().contains(&HwEvent::EnterSleep));
}

#[test]
fn test_try_sleep_refuses_budget_below_early_wake_margin() {
    // Tick de 100 kHz (período 10 us): 3 ticks ociosos passam do mínimo de
    // 2 ticks, mas os 30 us não cobrem a margem de acordar cedo - não dorme
    set_core(0);
    let ctx = PmContext::new(SimHal::new(1, 80));
    ctx.init(80, 100_000).unwrap();
    ctx.configure(&PmConfig {
        max_freq_mhz: 80,
        min_freq_mhz: 80,
        light_sleep_enable: true,
    })
    .unwrap();
    ctx.idle_hook();
    assert_eq!(ctx.mode(), Mode::LightSleep);

    ctx.hal().set_next_alarm_in(1_000_000);
    assert!(!ctx.try_sleep(3));
    let events = ctx.hal().events();
    assert!(!events.contains(&HwEvent::EnterSleep));
    assert!(!events.iter().any(|e| matches!(e, HwEvent::ArmWakeup(_))));
}

#[test]
fn test_try_sleep_respects_next_alarm() {
    let ctx = sleeping_ctx();
    // Alarme do timer daqui a 5 ms: menos que 2 ticks, não vale dormir
    ctx.hal().set_next_alarm_in(5_000);
    assert!(!ctx.try_sleep(5));
    assert!(!ctx.hal().events().contains(&HwEvent::EnterSleep));
}

//! Testes do motor de energia
//!
//! Testes unitários e de integração executados no host, com uma
//! plataforma simulada (`SimHal`) no lugar do hardware.
//!
//! # Convenções
//!
//! - Prefixo `test_` para testes unitários
//! - O id do core é thread-local (`set_core`); cenários com dois cores
//!   usam `std::thread::scope`
//! - O relógio simulado avança 1 us por leitura (configurável), então
//!   busy-waits com deadline terminam sem ajuda externa

#![cfg(test)]

pub mod idle_sleep;


use core::array;
use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::vec::Vec;

use crate::config::FrequencyMhz;
use crate::hal::{PmHal, MAX_CPUS};
use crate::PmContext;

std::thread_local! {
    static CORE_ID: Cell<usize> = Cell::new(0);
}

/// Define o core simulado da thread corrente
pub fn set_core(core: usize) {
    CORE_ID.with(|c| c.set(core));
}

fn current_core() -> usize {
    CORE_ID.with(|c| c.get())
}

/// Operações de hardware observáveis, em ordem de ocorrência
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwEvent {
    SetFreq(FrequencyMhz),
    SetCcompare(usize, u32),
    Ipi(usize),
    UpdateApbTicks(u32),
    ArmWakeup(u64),
    EnterSleep,
    StepTicks(u32),
}

/// Plataforma simulada: registradores por core + log de eventos
pub struct SimHal {
    num_cpus: usize,
    freq: AtomicU32,
    ccount: [AtomicU32; MAX_CPUS],
    ccompare: [AtomicU32; MAX_CPUS],
    now: AtomicU64,
    /// Avanço do relógio por leitura (0 = relógio parado)
    now_step: AtomicU64,
    next_alarm: AtomicU64,
    armed_wakeup: AtomicU64,
    ipi_pending: [AtomicBool; MAX_CPUS],
    events: Mutex<Vec<HwEvent>>,
}

impl SimHal {
    pub fn new(num_cpus: usize, freq_mhz: FrequencyMhz) -> Self {
        Self {
            num_cpus,
            freq: AtomicU32::new(freq_mhz),
            ccount: array::from_fn(|_| AtomicU32::new(0)),
            ccompare: array::from_fn(|_| AtomicU32::new(u32::MAX / 4)),
            now: AtomicU64::new(1_000),
            now_step: AtomicU64::new(1),
            next_alarm: AtomicU64::new(u64::MAX),
            armed_wakeup: AtomicU64::new(0),
            ipi_pending: array::from_fn(|_| AtomicBool::new(false)),
            events: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, event: HwEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Programa contador e compare de um core específico
    pub fn set_cycles(&self, core: usize, ccount: u32, ccompare: u32) {
        self.ccount[core].store(ccount, Ordering::Release);
        self.ccompare[core].store(ccompare, Ordering::Release);
    }

    pub fn ccompare_of(&self, core: usize) -> u32 {
        self.ccompare[core].load(Ordering::Acquire)
    }

    /// Consome uma IPI pendente do core (retorna se havia)
    pub fn take_ipi(&self, core: usize) -> bool {
        self.ipi_pending[core].swap(false, Ordering::AcqRel)
    }

    /// Leitura do relógio sem avançá-lo
    pub fn now_raw(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }

    /// Avança o relógio simulado
    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::AcqRel);
    }

    /// Congela (step 0) ou destrava (step n) o avanço por leitura
    pub fn set_now_step(&self, step: u64) {
        self.now_step.store(step, Ordering::Release);
    }

    /// Próximo alarme do timer daqui a `us`
    pub fn set_next_alarm_in(&self, us: u64) {
        self.next_alarm.store(self.now_raw() + us, Ordering::Release);
    }

    pub fn events(&self) -> Vec<HwEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl PmHal for SimHal {
    fn num_cpus(&self) -> usize {
        self.num_cpus
    }

    fn core_id(&self) -> usize {
        current_core()
    }

    fn irq_save(&self) -> bool {
        false
    }

    fn irq_restore(&self, _were_enabled: bool) {}

    fn cpu_frequency(&self) -> FrequencyMhz {
        self.freq.load(Ordering::Acquire)
    }

    fn set_cpu_frequency(&self, freq_mhz: FrequencyMhz) {
        self.freq.store(freq_mhz, Ordering::Release);
        self.record(HwEvent::SetFreq(freq_mhz));
    }

    fn cycle_count(&self) -> u32 {
        self.ccount[current_core()].load(Ordering::Acquire)
    }

    fn set_cycle_count(&self, value: u32) {
        self.ccount[current_core()].store(value, Ordering::Release);
    }

    fn cycle_compare(&self) -> u32 {
        self.ccompare[current_core()].load(Ordering::Acquire)
    }

    fn set_cycle_compare(&self, value: u32) {
        let core = current_core();
        self.ccompare[core].store(value, Ordering::Release);
        self.record(HwEvent::SetCcompare(core, value));
    }

    fn timer_interrupt_pending(&self) -> bool {
        // O contador continua correndo: avança um punhado de ciclos por
        // consulta até alcançar o compare
        let core = current_core();
        let count = self.ccount[core].fetch_add(8, Ordering::AcqRel).wrapping_add(8);
        let compare = self.ccompare[core].load(Ordering::Acquire);
        count.wrapping_sub(compare) < u32::MAX / 2
    }

    fn send_freq_switch_ipi(&self, core: usize) {
        self.ipi_pending[core].store(true, Ordering::Release);
        self.record(HwEvent::Ipi(core));
    }

    fn now_us(&self) -> u64 {
        let step = self.now_step.load(Ordering::Acquire);
        self.now.fetch_add(step, Ordering::AcqRel) + step
    }

    fn next_timer_event_us(&self) -> u64 {
        self.next_alarm.load(Ordering::Acquire)
    }

    fn update_apb_ticks(&self, ticks_per_us: u32) {
        self.record(HwEvent::UpdateApbTicks(ticks_per_us));
    }

    fn arm_wakeup_timer(&self, duration_us: u64) {
        self.armed_wakeup.store(duration_us, Ordering::Release);
        self.record(HwEvent::ArmWakeup(duration_us));
    }

    fn enter_light_sleep(&self) {
        // Dorme exatamente até o wakeup armado
        let slept = self.armed_wakeup.load(Ordering::Acquire);
        self.now.fetch_add(slept, Ordering::AcqRel);
        self.record(HwEvent::EnterSleep);
    }

    fn step_ticks(&self, ticks: u32) {
        self.record(HwEvent::StepTicks(ticks));
    }
}

/// Helper: contexto inicializado (tick de 100 Hz, modo CPU_MAX)
pub fn new_ctx(num_cpus: usize, freq_mhz: FrequencyMhz) -> PmContext<SimHal> {
    set_core(0);
    let ctx = PmContext::new(SimHal::new(num_cpus, freq_mhz));
    ctx.init(freq_mhz, 100).expect("init do contexto de teste");
    ctx
}

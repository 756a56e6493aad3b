//! Arquivo: idle.rs
//!
//! Propósito: Integração com o idle do scheduler e decisão de sleep.
//! Quando um core não tem trabalho, libera seu lock baseline (abrindo
//! caminho para modos mais baixos); qualquer interrupção readquire o lock
//! antes do handler do usuário observar o modo.
//!
//! Detalhes de Implementação:
//! - `idle_hook` roda sob máscara de interrupções apenas (sem o spinlock):
//!   o flag de idle é exclusivo do próprio core.
//! - `try_sleep` segura a seção crítica do início ao fim, inclusive
//!   através da primitiva de sleep - nenhuma troca pode correr no meio.

use core::sync::atomic::Ordering;

use crate::context::LockOp;
use crate::hal::PmHal;
use crate::mode::Mode;
use crate::PmContext;

/// Acorda este tanto de microssegundos antes do deadline real
const LIGHT_SLEEP_EARLY_WAKEUP_US: u64 = 100;

/// Tempo ocioso mínimo, em ticks, para valer a pena dormir
const MIN_IDLE_TICKS_BEFORE_SLEEP: u32 = 2;

impl<H: PmHal> PmContext<H> {
    /// Hook do idle task: libera o lock baseline deste core uma única vez
    /// por período ocioso (pode disparar uma troca para modo mais baixo).
    pub fn idle_hook(&self) {
        let core = self.hal.core_id();
        let irq = self.hal.irq_save();
        if !self.core_idle.get(core) {
            let released = self.apply(Mode::CpuMax, LockOp::Unlock);
            debug_assert!(released.is_ok(), "baseline lock ja estava liberado");
            self.core_idle.set(core);
        }
        self.hal.irq_restore(irq);
        log::trace!("pm: idle (core {})", core);
    }

    /// Saindo do idle por interrupção: readquire o lock baseline antes de
    /// qualquer trabalho em contexto de interrupção
    pub(crate) fn leave_idle(&self) {
        let core = self.hal.core_id();
        if self.core_idle.get(core) {
            let acquired = self.apply(Mode::CpuMax, LockOp::Lock);
            debug_assert!(acquired.is_ok());
            self.core_idle.clear(core);
        }
    }

    /// Hook do epílogo genérico de interrupção deste core.
    ///
    /// Se o core tem uma ressincronização de cycle-compare pendente
    /// (pedida por outro core no meio de uma troca), atende e libera o
    /// iniciador; senão, trata como saída de idle.
    pub fn isr_hook(&self) {
        let core = self.hal.core_id();
        if self.hal.num_cpus() > 1 && self.ccompare_pending.get(core) {
            self.update_ccompare();
            self.ccompare_pending.clear(core);
        } else {
            self.leave_idle();
        }
    }

    /// Decisão de sleep, chamada pelo scheduler quando não há task
    /// executável e `expected_idle_ticks` de ociosidade estão disponíveis.
    ///
    /// Só dorme com o modo corrente em LightSleep e nenhuma troca em
    /// andamento. Retorna se dormiu de fato (o scheduler pode então pular
    /// o trabalho extra de idle).
    pub fn try_sleep(&self, expected_idle_ticks: u32) -> bool {
        let mut slept = false;
        let st = self.state.lock(&self.hal);
        if st.mode == Mode::LightSleep && !st.is_switching {
            let tick_period_us = 1_000_000u64 / self.tick_hz.load(Ordering::Acquire) as u64;

            // Quanto dá para dormir: o que vier primeiro entre o próximo
            // alarme do timer e a fatia que o scheduler ofereceu
            let now = self.hal.now_us();
            let until_next_alarm = self.hal.next_timer_event_us().saturating_sub(now);
            let idle_budget_us = tick_period_us * expected_idle_ticks as u64;
            let sleep_time_us = idle_budget_us.min(until_next_alarm);

            // Além do mínimo de ticks, o orçamento precisa exceder a
            // margem de acordar cedo (ticks muito rápidos chegam aqui com
            // orçamentos menores que a margem)
            if sleep_time_us >= MIN_IDLE_TICKS_BEFORE_SLEEP as u64 * tick_period_us
                && sleep_time_us > LIGHT_SLEEP_EARLY_WAKEUP_US
            {
                self.hal
                    .arm_wakeup_timer(sleep_time_us - LIGHT_SLEEP_EARLY_WAKEUP_US);

                let core = self.hal.core_id();
                log::trace!("pm: light sleep enter (core {})", core);
                let sleep_start = self.hal.now_us();
                self.hal.enter_light_sleep();
                let slept_us = self.hal.now_us().saturating_sub(sleep_start);
                log::trace!("pm: light sleep exit (core {}, {} us)", core, slept_us);

                let slept_ticks = (slept_us / tick_period_us) as u32;
                if slept_ticks > 0 {
                    // Repõe no scheduler os ticks que o sleep engoliu
                    self.hal.step_ticks(slept_ticks);

                    // Força um tick: escrever no conjunto de interrupções
                    // não funciona para o timer, e mexer no compare
                    // limparia o pedido - então recua o contador até logo
                    // antes do compare e espera a interrupção pender
                    self.hal
                        .set_cycle_count(self.hal.cycle_compare().wrapping_sub(16));
                    while !self.hal.timer_interrupt_pending() {
                        core::hint::spin_loop();
                    }
                }
                slept = true;
            }
        }
        slept
    }
}

//! Arquivo: switch.rs
//!
//! Propósito: Protocolo de troca de frequência.
//! Estados por tentativa: Idle -> Requested -> Switching -> Idle.
//! Quando o divisor de clock muda, o cycle-compare de CADA core precisa ser
//! reescalado para o tick do scheduler continuar caindo no mesmo instante
//! de relógio de parede.
//!
//! Detalhes de Implementação:
//! - Descendo de frequência: ressincroniza ANTES de programar o divisor.
//!   Subindo: programa o divisor primeiro. Assim o próximo tick nunca
//!   dispara cedo ou tarde demais além de uma janela de compare.
//! - O core iniciador não alcança o registrador do outro core: seta o flag
//!   pendente dele, manda IPI e espera o flag limpar (busy-wait com
//!   deadline no relógio monotônico; estourar o deadline é fatal).

use core::sync::atomic::Ordering;

use crate::config::APB_MAX_TICKS_PER_US;
use crate::hal::PmHal;
use crate::mode::Mode;
use crate::PmContext;

/// Deadline do busy-wait pela atualização remota do cycle-compare.
/// Generoso de propósito: qualquer valor acima de alguns milhares de
/// ciclos serve para detectar deadlock.
const CCOMPARE_UPDATE_TIMEOUT_US: u64 = 10_000;

/// Não mexer no compare se a diferença for menor que isto - evita
/// programar um compare que já ficou atrás do contador.
const CCOMPARE_MIN_CYCLES_IN_FUTURE: u32 = 1000;

impl<H: PmHal> PmContext<H> {
    /// Executa a troca para `new_mode`.
    ///
    /// Hoje troca apenas a frequência de CPU e ajusta os divisores; a
    /// entrada física em light sleep fica com o hook de sleep.
    pub(crate) fn do_switch(&self, new_mode: Mode) {
        let core = self.hal.core_id();

        // Requested: se outra troca está em andamento, espera cooperando.
        // Se ESTE core ficou com um pedido de ressincronização pendente da
        // troca alheia, atende aqui mesmo - senão o iniciador da outra
        // troca ficaria esperando um handler que não vai rodar.
        let mut st = loop {
            let st = self.state.lock(&self.hal);
            if !st.is_switching {
                break st;
            }
            if self.ccompare_pending.get(core) {
                self.ccompare_pending.clear(core);
            }
            drop(st);
            core::hint::spin_loop();
        };

        if new_mode == st.mode {
            return;
        }
        st.is_switching = true;
        // Captura e limpa juntos: uma reconfiguração durante a troca vale
        // só para a troca seguinte
        let config_changed = st.config_changed;
        st.config_changed = false;
        let old_mode = st.mode;
        let new_freq = st.freq_by_mode[new_mode.index()];
        let table_old_freq = st.freq_by_mode[old_mode.index()];
        drop(st);

        // Após reconfiguração o alvo cacheado do modo corrente pode não
        // refletir a frequência física - pergunta ao hardware
        let old_freq = if config_changed {
            self.hal.cpu_frequency()
        } else {
            table_old_freq
        };

        if new_freq != old_freq {
            // ticks do cycle counter por microssegundo == MHz
            let old_ticks_per_us = old_freq;
            let new_ticks_per_us = new_freq;
            let switch_down = new_ticks_per_us < old_ticks_per_us;

            log::trace!(
                "pm: freq switch {} -> {} MHz (core {})",
                old_freq,
                new_freq,
                core
            );
            if switch_down {
                self.on_freq_update(old_ticks_per_us, new_ticks_per_us);
            }
            self.hal.set_cpu_frequency(new_freq);
            if !switch_down {
                self.on_freq_update(old_ticks_per_us, new_ticks_per_us);
            }
        }

        let mut st = self.state.lock(&self.hal);
        st.mode = new_mode;
        st.is_switching = false;
    }

    /// Atualiza divisores dependentes da frequência e reescala o
    /// cycle-compare em todos os cores.
    pub(crate) fn on_freq_update(&self, old_ticks_per_us: u32, ticks_per_us: u32) {
        // O timer de referência roda no APB, que satura em 80 ticks/us
        let old_apb_ticks = old_ticks_per_us.min(APB_MAX_TICKS_PER_US);
        let apb_ticks = ticks_per_us.min(APB_MAX_TICKS_PER_US);
        if old_apb_ticks != apb_ticks {
            self.hal.update_apb_ticks(apb_ticks);
        }

        // Novo divisor de tick do scheduler
        let tick_hz = self.tick_hz.load(Ordering::Acquire);
        self.tick_divisor
            .store(ticks_per_us * 1_000_000 / tick_hz, Ordering::Release);

        if !self.init_done.load(Ordering::Acquire) {
            // Sem locks baseline ainda: nada para ressincronizar
            return;
        }

        let core = self.hal.core_id();
        log::trace!("pm: ccompare update enter (core {})", core);

        // Fatores usados por update_ccompare (inclusive no outro core)
        self.ccount_div.store(old_ticks_per_us, Ordering::Release);
        self.ccount_mul.store(ticks_per_us, Ordering::Release);

        // Core local primeiro
        self.update_ccompare();

        // Os demais cores atualizam via interrupção de troca-de-frequência
        for other in 0..self.hal.num_cpus() {
            if other == core {
                continue;
            }
            self.ccompare_pending.set(other);
            self.hal.send_freq_switch_ipi(other);

            let deadline = self.hal.now_us() + CCOMPARE_UPDATE_TIMEOUT_US;
            while self.ccompare_pending.get(other) {
                if self.hal.now_us() > deadline {
                    // Continuar significaria skew de tick sem limite entre
                    // os cores - não há retry por projeto
                    log::error!(
                        "pm: core {} did not ack ccompare update in {} us \
                         (mul={} div={} mode switch on core {})",
                        other,
                        CCOMPARE_UPDATE_TIMEOUT_US,
                        ticks_per_us,
                        old_ticks_per_us,
                        core
                    );
                    panic!("pm: ccompare update deadlock");
                }
                core::hint::spin_loop();
            }
        }

        self.ccount_mul.store(0, Ordering::Release);
        self.ccount_div.store(0, Ordering::Release);
        log::trace!("pm: ccompare update exit (core {})", core);
    }

    /// Reescala o cycle-compare deste core pelos fatores publicados, para a
    /// interrupção cair no mesmo instante que cairia sem a mudança de
    /// frequência. Assume new_freq = old_freq * ccount_mul / ccount_div.
    pub(crate) fn update_ccompare(&self) {
        let ccount = self.hal.cycle_count();
        let ccompare = self.hal.cycle_compare();
        // Só mexe se o compare ainda está no futuro (aritmética modular),
        // com folga mínima para não programar um valor já ultrapassado
        if ccompare
            .wrapping_sub(CCOMPARE_MIN_CYCLES_IN_FUTURE)
            .wrapping_sub(ccount)
            < u32::MAX / 2
        {
            let diff = ccompare.wrapping_sub(ccount);
            let mul = self.ccount_mul.load(Ordering::Acquire) as u64;
            let div = self.ccount_div.load(Ordering::Acquire) as u64;
            let diff_scaled = ((diff as u64 * mul + div - 1) / div) as u32;
            if diff_scaled < self.tick_divisor.load(Ordering::Acquire) {
                self.hal.set_cycle_compare(ccount.wrapping_add(diff_scaled));
            }
            // Se passou de um período de tick, o tick periódico re-arma
            // o compare com segurança
        }
    }
}

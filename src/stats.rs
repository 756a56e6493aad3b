//! Contabilidade de tempo-por-modo (feature `profiling`)
//!
//! Acumula microssegundos em cada modo no instante em que uma troca é
//! decidida, dentro da mesma seção crítica do registro de locks.

use core::fmt;

use crate::hal::PmHal;
use crate::mode::{Mode, MODE_COUNT};
use crate::PmContext;

/// Acumulador por modo + timestamp da última troca
pub(crate) struct ModeStats {
    /// Microssegundos acumulados em cada modo
    pub(crate) time_in_mode: [u64; MODE_COUNT],
    /// Instante (us) da última mudança de modo; 0 = nunca mudou
    pub(crate) last_change_us: u64,
}

impl ModeStats {
    pub(crate) const fn new() -> Self {
        Self {
            time_in_mode: [0; MODE_COUNT],
            last_change_us: 0,
        }
    }

    /// Credita ao modo que está saindo o tempo decorrido desde a última
    /// troca. Chamar antes de comitar o novo modo.
    pub(crate) fn note_mode_change(&mut self, outgoing: Mode, now_us: u64) {
        if self.last_change_us != 0 {
            let diff = now_us.saturating_sub(self.last_change_us);
            self.time_in_mode[outgoing.index()] += diff;
        }
        self.last_change_us = now_us;
    }
}

impl<H: PmHal> PmContext<H> {
    /// Dump de diagnóstico: nome, frequência configurada, tempo acumulado
    /// e percentual do total observado, por modo.
    pub fn dump_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        // Snapshot sob a seção crítica; formatação fora dela
        let (mut time_in_mode, last_change, cur_mode, light_sleep_en, freqs, now) = {
            let st = self.state.lock(&self.hal);
            (
                st.stats.time_in_mode,
                st.stats.last_change_us,
                st.mode,
                st.light_sleep_enabled,
                st.freq_by_mode,
                self.hal.now_us(),
            )
        };

        // O modo corrente ainda está correndo
        time_in_mode[cur_mode.index()] += now.saturating_sub(last_change);

        writeln!(out, "Mode stats:")?;
        let total = now.max(1);
        for mode in Mode::ALL {
            if mode == Mode::LightSleep && !light_sleep_en {
                // não exibir light sleep se está desabilitado
                continue;
            }
            let t = time_in_mode[mode.index()];
            writeln!(
                out,
                "{:>8} {:>6} {:>12} {:>3}%",
                mode.name(),
                freqs[mode.index()],
                t,
                t * 100 / total
            )?;
        }
        Ok(())
    }
}

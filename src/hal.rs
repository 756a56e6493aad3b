//! Arquivo: hal.rs
//!
//! Propósito: Fronteira com o hardware e com o scheduler.
//! O motor de energia não programa clock tree nem registradores diretamente;
//! o kernel implementa este trait e injeta a implementação no contexto.
//!
//! Detalhes de Implementação:
//! - Operações de cycle counter referem-se sempre ao core corrente
//!   (o registrador não é endereçável remotamente, daí o handshake por IPI).
//! - `irq_save`/`irq_restore` devem suportar aninhamento.

use crate::config::FrequencyMhz;

/// Número máximo de cores suportados pelas estruturas fixas
pub const MAX_CPUS: usize = 4;

/// Primitivas de hardware e de scheduler consumidas pelo motor de energia.
///
/// Implementado pelo kernel (camada arch) ou por uma plataforma simulada
/// nos testes. Todas as operações são O(1) e chamáveis de contexto de
/// interrupção, exceto `enter_light_sleep`.
pub trait PmHal: Send + Sync {
    /// Quantidade de cores ativos (<= MAX_CPUS)
    fn num_cpus(&self) -> usize;

    /// Identificador do core que está executando
    fn core_id(&self) -> usize;

    /// Desabilita interrupções locais; retorna se estavam habilitadas
    fn irq_save(&self) -> bool;

    /// Restaura o estado de interrupções salvo por `irq_save`
    fn irq_restore(&self, were_enabled: bool);

    /// Frequência real corrente da CPU (leitura do hardware, não de cache)
    fn cpu_frequency(&self) -> FrequencyMhz;

    /// Programa o divisor de clock da CPU para a frequência alvo
    fn set_cpu_frequency(&self, freq_mhz: FrequencyMhz);

    /// Valor corrente do cycle counter (free-running) deste core
    fn cycle_count(&self) -> u32;

    /// Sobrescreve o cycle counter deste core
    fn set_cycle_count(&self, value: u32);

    /// Valor de comparação que dispara a interrupção de tick neste core
    fn cycle_compare(&self) -> u32;

    /// Reprograma o valor de comparação deste core
    fn set_cycle_compare(&self, value: u32);

    /// Há interrupção de timer pendente neste core?
    fn timer_interrupt_pending(&self) -> bool;

    /// Entrega a interrupção de troca-de-frequência ao core indicado
    fn send_freq_switch_ipi(&self, core: usize);

    /// Relógio monotônico em microssegundos (timer de alta resolução)
    fn now_us(&self) -> u64;

    /// Instante absoluto (us) do próximo alarme do timer de alta resolução
    fn next_timer_event_us(&self) -> u64;

    /// Atualiza a resolução do timer de referência quando o APB muda
    fn update_apb_ticks(&self, ticks_per_us: u32);

    /// Arma o timer de wakeup para daqui a `duration_us`
    fn arm_wakeup_timer(&self, duration_us: u64);

    /// Entra em light sleep; retorna quando o wakeup dispara
    fn enter_light_sleep(&self);

    /// Avança a contagem de ticks do scheduler após um período dormido
    fn step_ticks(&self, ticks: u32);
}

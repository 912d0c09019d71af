//! End-to-end tests: Lua scripts reacting to interrupts raised on a
//! simulated platform.
//!
//! Most tests expose a `raise(id, res)` global so a script can trigger an
//! interrupt at a precise point; the raise runs `dispatch` synchronously,
//! exactly as interrupt context would.

use irqbridge_core::testing::RecordingNative;
use irqbridge_core::{
    BridgeConfig, EventType, InterruptBridge, OverflowPolicy, PlatformLayout, ResourceId,
    SimulatedPlatform,
};
use irqbridge_lua::{LuaError, ScriptHost};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn host_with_raise<const N: usize>(
    config: BridgeConfig,
) -> (Arc<SimulatedPlatform>, ScriptHost<N>) {
    let platform = Arc::new(SimulatedPlatform::new(PlatformLayout::default()));
    let bridge = Arc::new(InterruptBridge::<N>::with_config(platform.clone(), config));
    let host = ScriptHost::new(Arc::clone(&bridge)).expect("host");

    let p = Arc::clone(&platform);
    let raise = host
        .lua()
        .create_function(move |_, (id, res): (i64, u32)| {
            let event = EventType::from_code(id)
                .ok_or_else(|| mlua::Error::RuntimeError(format!("bad id {id}")))?;
            p.raise(&bridge, event, ResourceId(res))
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
            Ok(())
        })
        .expect("create raise");
    host.lua().globals().set("raise", raise).expect("set raise");
    (platform, host)
}

fn host() -> (Arc<SimulatedPlatform>, ScriptHost<32>) {
    host_with_raise(BridgeConfig::default())
}

// ── Delivery ─────────────────────────────────────────────────────

#[test]
fn handler_runs_between_instructions() {
    let (_, host) = host();
    host.exec(
        r#"
        local seen = nil
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) seen = id end)
        cpu.sei(cpu.INT_TMR_MATCH, 2)
        raise(cpu.INT_TMR_MATCH, 2)
        local spins = 0
        while seen == nil and spins < 1000 do spins = spins + 1 end
        assert(seen == 2, "handler not delivered")
        "#,
    )
    .expect("script");
    assert!(!host.bridge().is_armed());
}

#[test]
fn events_delivered_in_raise_order() {
    let (_, host) = host();
    host.exec(
        r#"
        order = {}
        local function h(id) order[#order + 1] = id end
        cpu.set_int_handler(cpu.INT_GPIO_POSEDGE, h)
        cpu.set_int_handler(cpu.INT_GPIO_NEGEDGE, function(id) order[#order + 1] = -id end)
        local a, b = cpu.gpio(0, 3), cpu.gpio(1, 7)
        cpu.sei(cpu.INT_GPIO_POSEDGE, a, b)
        cpu.sei(cpu.INT_GPIO_NEGEDGE, a)
        cpu.cli()
        raise(cpu.INT_GPIO_POSEDGE, b)
        raise(cpu.INT_GPIO_NEGEDGE, a)
        raise(cpu.INT_GPIO_POSEDGE, a)
        cpu.sei()
        "#,
    )
    .expect("setup");
    // CPU-wide switch was off: flags latched, nothing queued.
    assert_eq!(host.bridge().pending(), 0);

    host.exec(
        r#"
        local a, b = cpu.gpio(0, 3), cpu.gpio(1, 7)
        raise(cpu.INT_GPIO_POSEDGE, b)
        raise(cpu.INT_GPIO_NEGEDGE, a)
        raise(cpu.INT_GPIO_POSEDGE, a)
        for i = 1, 100 do end
        "#,
    )
    .expect("run");
    let order: Vec<i64> = host.lua().load("return order").eval().expect("order");
    let a = i64::from(ResourceId::gpio(0, 3).raw());
    let b = i64::from(ResourceId::gpio(1, 7).raw());
    assert_eq!(order, vec![b, -a, a]);
}

#[test]
fn event_type_switch_gates_all_lines() {
    let (_, host) = host();
    host.exec(
        r#"
        seen = {}
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) seen[#seen + 1] = id end)
        cpu.sei(cpu.INT_TMR_MATCH, 0, 1)
        assert(cpu.cli(cpu.INT_TMR_MATCH) == true)
        raise(cpu.INT_TMR_MATCH, 0)
        raise(cpu.INT_TMR_MATCH, 1)
        for i = 1, 100 do end
        assert(#seen == 0, "delivered while event type disabled")
        assert(cpu.get_int_flag(cpu.INT_TMR_MATCH, 1, false))

        assert(cpu.sei(cpu.INT_TMR_MATCH) == false)
        raise(cpu.INT_TMR_MATCH, 1)
        for i = 1, 100 do end
        "#,
    )
    .expect("script");
    let seen: Vec<u32> = host.lua().load("return seen").eval().expect("seen");
    assert_eq!(seen, vec![1]);
}

#[test]
fn shared_interrupt_reaches_both_sides() {
    let (_, host) = host();
    let native = RecordingNative::new();
    host.bridge()
        .set_native_handler(EventType::TimerMatch, Some(native.handler()))
        .expect("native");

    host.exec(
        r#"
        seen = {}
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) seen[#seen + 1] = id end)
        cpu.sei(cpu.INT_TMR_MATCH, 0, 1)
        raise(cpu.INT_TMR_MATCH, 0)
        raise(cpu.INT_TMR_MATCH, 1)
        for i = 1, 100 do end
        "#,
    )
    .expect("script");

    let seen: Vec<u32> = host.lua().load("return seen").eval().expect("seen");
    assert_eq!(seen, vec![0, 1]);
    assert_eq!(native.calls(), vec![ResourceId(0), ResourceId(1)]);
}

#[test]
fn previous_handler_can_be_chained() {
    let (_, host) = host();
    host.exec(
        r#"
        calls = {}
        cpu.set_int_handler(cpu.INT_UART_RX, function(id)
            calls[#calls + 1] = "first:" .. id
        end)
        local prev
        prev = cpu.set_int_handler(cpu.INT_UART_RX, function(id)
            calls[#calls + 1] = "second:" .. id
            prev(id)
        end)
        cpu.sei(cpu.INT_UART_RX, 1)
        raise(cpu.INT_UART_RX, 1)
        for i = 1, 100 do end
        "#,
    )
    .expect("script");
    let calls: Vec<String> = host.lua().load("return calls").eval().expect("calls");
    assert_eq!(calls, vec!["second:1", "first:1"]);
}

// ── Stale delivery ───────────────────────────────────────────────

#[test]
fn unregistered_handler_drops_queued_entries() {
    let (_, host) = host();
    host.exec(
        r#"
        hits = 0
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) hits = hits + 1 end)
        cpu.sei(cpu.INT_TMR_MATCH, 0)
        raise(cpu.INT_TMR_MATCH, 0)
        cpu.set_int_handler(cpu.INT_TMR_MATCH, nil)
        for i = 1, 100 do end
        "#,
    )
    .expect("script");
    let hits: i64 = host.lua().globals().get("hits").expect("hits");
    assert_eq!(hits, 0);
    assert_eq!(host.bridge().pending(), 0);
}

#[test]
fn handler_replaced_before_drain_receives_entry() {
    let (_, host) = host();
    host.exec(
        r#"
        who = nil
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function() who = "old" end)
        cpu.sei(cpu.INT_TMR_MATCH, 3)
        raise(cpu.INT_TMR_MATCH, 3)
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function() who = "new" end)
        for i = 1, 100 do end
        "#,
    )
    .expect("script");
    let who: String = host.lua().globals().get("who").expect("who");
    assert_eq!(who, "new");
}

// ── Re-entrancy ──────────────────────────────────────────────────

#[test]
fn handler_is_not_preempted_by_new_events() {
    let (_, host) = host();
    host.exec(
        r#"
        trace = {}
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id)
            trace[#trace + 1] = "enter" .. id
            if id == 0 then
                raise(cpu.INT_TMR_MATCH, 1)
                for i = 1, 100 do end
            end
            trace[#trace + 1] = "exit" .. id
        end)
        cpu.sei(cpu.INT_TMR_MATCH, 0, 1)
        raise(cpu.INT_TMR_MATCH, 0)
        for i = 1, 200 do end
        "#,
    )
    .expect("script");
    let trace: Vec<String> = host.lua().load("return trace").eval().expect("trace");
    assert_eq!(trace, vec!["enter0", "exit0", "enter1", "exit1"]);
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn handler_error_propagates_out_of_exec() {
    let (_, host) = host();
    let err = host
        .exec(
            r#"
            cpu.set_int_handler(cpu.INT_UART_RX, function(id)
                error("framing error on uart " .. id)
            end)
            cpu.sei(cpu.INT_UART_RX, 0)
            raise(cpu.INT_UART_RX, 0)
            for i = 1, 100 do end
            "#,
        )
        .expect_err("handler error must surface");
    let msg = err.to_string();
    assert!(matches!(err, LuaError::Runtime(_)));
    assert!(msg.contains("framing error on uart 0"), "got: {msg}");
    assert!(msg.contains("uart_rx"), "got: {msg}");

    // Bridge recovers: the next event is delivered normally.
    host.exec(
        r#"
        ok = false
        cpu.set_int_handler(cpu.INT_UART_RX, function() ok = true end)
        raise(cpu.INT_UART_RX, 0)
        for i = 1, 100 do end
        "#,
    )
    .expect("recovered");
    let ok: bool = host.lua().globals().get("ok").expect("ok");
    assert!(ok);
}

#[test]
fn handler_error_can_be_caught_with_pcall() {
    let (_, host) = host();
    host.exec(
        r#"
        cpu.set_int_handler(cpu.INT_SPI_DONE, function() error("crc mismatch") end)
        cpu.sei(cpu.INT_SPI_DONE, 0)
        caught = nil
        local ok, err = pcall(function()
            raise(cpu.INT_SPI_DONE, 0)
            for i = 1, 100 do end
        end)
        caught = tostring(err)
        "#,
    )
    .expect("script");
    let caught: String = host.lua().globals().get("caught").expect("caught");
    assert!(caught.contains("crc mismatch"), "got: {caught}");
}

#[test]
fn unsupported_event_rejected_from_lua() {
    let platform = Arc::new(SimulatedPlatform::new(PlatformLayout {
        uarts: 0,
        ..PlatformLayout::default()
    }));
    let bridge: Arc<InterruptBridge> = Arc::new(InterruptBridge::new(platform));
    let host = ScriptHost::new(bridge).expect("host");
    let (ok, msg): (bool, String) = host
        .lua()
        .load(
            r#"
            local ok, err = pcall(cpu.set_int_handler, cpu.INT_UART_RX, function() end)
            return ok, tostring(err)
            "#,
        )
        .eval()
        .expect("pcall");
    assert!(!ok);
    assert!(msg.contains("invalid registration"), "got: {msg}");
}

// ── Polling ──────────────────────────────────────────────────────

#[test]
fn disabled_line_is_polled_with_get_int_flag() {
    let (_, host) = host();
    host.exec(
        r#"
        hits = 0
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function() hits = hits + 1 end)
        raise(cpu.INT_TMR_MATCH, 1)
        for i = 1, 100 do end
        assert(hits == 0, "disabled line must not dispatch")
        assert(cpu.get_int_flag(cpu.INT_TMR_MATCH, 1, false) == true)
        assert(cpu.get_int_flag(cpu.INT_TMR_MATCH, 1) == true)
        assert(cpu.get_int_flag(cpu.INT_TMR_MATCH, 1) == false)
        "#,
    )
    .expect("script");
}

// ── Capacity ─────────────────────────────────────────────────────

#[test]
fn full_queue_drops_newest_events() {
    let config = BridgeConfig::new().with_overflow_policy(OverflowPolicy::Coalesced);
    let (platform, host) = host_with_raise::<4>(config);
    host.exec(
        r#"
        cpu.sei(cpu.INT_TMR_MATCH, 0, 1, 2, 3)
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) end)
        "#,
    )
    .expect("setup");

    // Raise from Rust so no drain tick runs between the pushes.
    let bridge = Arc::clone(host.bridge());
    for res in [0, 1, 2, 3, 0, 1] {
        platform
            .raise(&bridge, EventType::TimerMatch, ResourceId(res))
            .expect("raise");
    }
    assert_eq!(bridge.pending(), 4);

    host.exec(
        r#"
        seen = {}
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id) seen[#seen + 1] = id end)
        for i = 1, 100 do end
        "#,
    )
    .expect("drain");
    let seen: Vec<u32> = host.lua().load("return seen").eval().expect("seen");
    assert_eq!(seen, vec![0, 1, 2, 3]);
    // Reported by the first drain tick.
    assert_eq!(bridge.queue().take_dropped(), 0);
}

// ── Peripheral threads ───────────────────────────────────────────

#[test]
fn peripheral_thread_events_reach_script() {
    let (platform, host) = host();
    host.exec(
        r#"
        ticks = 0
        cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id)
            if id == 0 then ticks = ticks + 1 end
        end)
        cpu.sei(cpu.INT_TMR_MATCH, 0)
        "#,
    )
    .expect("setup");

    let bridge = Arc::clone(host.bridge());
    let producer = thread::spawn(move || {
        for _ in 0..10 {
            platform
                .raise(&bridge, EventType::TimerMatch, ResourceId(0))
                .expect("raise");
            thread::sleep(Duration::from_millis(2));
        }
    });

    host.exec(
        r#"
        local deadline = os.clock() + 5
        while ticks < 10 and os.clock() < deadline do end
        "#,
    )
    .expect("wait loop");
    producer.join().expect("producer");
    host.drain_pending().expect("drain");

    let ticks: i64 = host.lua().globals().get("ticks").expect("ticks");
    assert_eq!(ticks, 10);
}

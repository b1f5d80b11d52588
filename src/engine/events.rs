// ==========================================
// 校车线路编排系统 - 引擎层事件发布
// ==========================================
// 职责: 把每次操作的成功/失败/告警通知给调用方 (界面提示、横幅)
// 说明: Engine 层定义 trait, 上层按需实现 (通道/日志/空实现)
// ==========================================

use crate::engine::error::{EngineError, FailureKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};

/// 通道事件发布者的默认队列长度
pub const DEFAULT_EVENT_QUEUE: usize = 256;

// ==========================================
// 线路事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteEventType {
    /// 变更已生效
    MutationApplied,
    /// 操作失败
    OperationFailed,
    /// 存在超载车辆
    CapacityWarning,
    /// 存在超时线路
    TimeWarning,
    /// 自动编排替换了看板布局
    LayoutReplaced,
    /// 草稿布局已落库
    LayoutSaved,
    /// 线路已确认
    RouteConfirmed,
}

impl RouteEventType {
    pub fn as_str(&self) -> &str {
        match self {
            RouteEventType::MutationApplied => "MutationApplied",
            RouteEventType::OperationFailed => "OperationFailed",
            RouteEventType::CapacityWarning => "CapacityWarning",
            RouteEventType::TimeWarning => "TimeWarning",
            RouteEventType::LayoutReplaced => "LayoutReplaced",
            RouteEventType::LayoutSaved => "LayoutSaved",
            RouteEventType::RouteConfirmed => "RouteConfirmed",
        }
    }
}

/// 线路事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEvent {
    pub event_type: RouteEventType,
    /// 触发的操作 (如 "move_student")
    pub operation: String,
    pub bus_ids: Vec<String>,
    pub failure_kind: Option<FailureKind>,
    pub message: Option<String>,
}

impl RouteEvent {
    pub fn new(event_type: RouteEventType, operation: &str, bus_ids: Vec<String>) -> Self {
        Self {
            event_type,
            operation: operation.to_string(),
            bus_ids,
            failure_kind: None,
            message: None,
        }
    }

    pub fn failed(operation: &str, err: &EngineError) -> Self {
        Self {
            event_type: RouteEventType::OperationFailed,
            operation: operation.to_string(),
            bus_ids: Vec::new(),
            failure_kind: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================
pub trait RouteEventPublisher: Send + Sync {
    fn publish(&self, event: RouteEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl RouteEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: RouteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - operation={}, event_type={}",
            event.operation,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 通道事件发布者 (界面层从接收端消费)
///
/// 队列满时丢弃新事件并告警, 操作本身不受影响
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: Sender<RouteEvent>,
}

impl ChannelEventPublisher {
    pub fn new() -> (Self, Receiver<RouteEvent>) {
        Self::with_capacity(DEFAULT_EVENT_QUEUE)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<RouteEvent>) {
        let (sender, receiver) = channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl RouteEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: RouteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    operation = %event.operation,
                    event_type = event.event_type.as_str(),
                    "事件队列已满, 丢弃事件"
                );
                Ok(())
            }
            Err(TrySendError::Closed(event)) => {
                Err(format!("事件通道已关闭: {}", event.operation).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_publisher_delivers_events() {
        let (publisher, mut rx) = ChannelEventPublisher::new();
        publisher
            .publish(RouteEvent::new(RouteEventType::MutationApplied, "move_student", vec!["B1".to_string()]))
            .unwrap();
        publisher
            .publish(RouteEvent::failed("confirm", &EngineError::NothingToConfirm))
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.event_type, RouteEventType::MutationApplied);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.failure_kind, Some(FailureKind::Blocked));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_event_without_error() {
        let (publisher, mut rx) = ChannelEventPublisher::with_capacity(1);
        publisher
            .publish(RouteEvent::new(RouteEventType::LayoutSaved, "save_layout", vec![]))
            .unwrap();
        let dropped = publisher.publish(
            RouteEvent::new(RouteEventType::TimeWarning, "auto_assign", vec!["B1".to_string()])
                .with_message("线路超时"),
        );
        assert!(dropped.is_ok());

        assert_eq!(rx.try_recv().unwrap().event_type, RouteEventType::LayoutSaved);
        assert!(rx.try_recv().is_err());

        // 消费后队列恢复可用
        publisher
            .publish(RouteEvent::new(RouteEventType::RouteConfirmed, "confirm", vec![]).with_message("ok"))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().message.as_deref(), Some("ok"));
    }

    #[test]
    fn test_channel_publisher_reports_closed_channel() {
        let (publisher, rx) = ChannelEventPublisher::new();
        drop(rx);
        let result = publisher.publish(RouteEvent::new(RouteEventType::RouteConfirmed, "confirm", vec![]));
        assert!(result.is_err());
    }
}

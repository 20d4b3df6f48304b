use std::collections::VecDeque;

use serde::Serialize;

use crate::request::{Priority, SearchRequest};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
	pub high: usize,
	pub medium: usize,
	pub low: usize,
}
impl QueueDepths {
	pub fn total(&self) -> usize {
		self.high + self.medium + self.low
	}
}

/// Three FIFO lanes, one per priority level.
#[derive(Debug, Default)]
pub struct PriorityQueues {
	high: VecDeque<SearchRequest>,
	medium: VecDeque<SearchRequest>,
	low: VecDeque<SearchRequest>,
}
impl PriorityQueues {
	pub fn enqueue(&mut self, request: SearchRequest) {
		self.lane_mut(request.priority()).push_back(request);
	}

	/// Takes up to `limit` requests from the highest non-empty lane only.
	pub fn dequeue_up_to(&mut self, limit: usize) -> Option<(Priority, Vec<SearchRequest>)> {
		if limit == 0 {
			return None;
		}

		let priority = Priority::ALL.into_iter().find(|level| !self.lane(*level).is_empty())?;
		let lane = self.lane_mut(priority);
		let take = limit.min(lane.len());

		Some((priority, lane.drain(..take).collect()))
	}

	/// Empties every lane, highest first.
	pub fn drain_all(&mut self) -> Vec<SearchRequest> {
		let mut out = Vec::with_capacity(self.sizes().total());

		for level in Priority::ALL {
			out.extend(self.lane_mut(level).drain(..));
		}

		out
	}

	pub fn sizes(&self) -> QueueDepths {
		QueueDepths { high: self.high.len(), medium: self.medium.len(), low: self.low.len() }
	}

	pub fn is_empty(&self) -> bool {
		self.sizes().total() == 0
	}

	fn lane(&self, priority: Priority) -> &VecDeque<SearchRequest> {
		match priority {
			Priority::High => &self.high,
			Priority::Medium => &self.medium,
			Priority::Low => &self.low,
		}
	}

	fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<SearchRequest> {
		match priority {
			Priority::High => &mut self.high,
			Priority::Medium => &mut self.medium,
			Priority::Low => &mut self.low,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(query: &str, priority: Priority) -> SearchRequest {
		let (request, _rx) =
			SearchRequest::new(query.to_string(), "title".to_string(), priority, None);

		request
	}

	fn queries(requests: &[SearchRequest]) -> Vec<&str> {
		requests.iter().map(SearchRequest::query).collect()
	}

	#[test]
	fn drains_highest_level_without_mixing() {
		let mut queues = PriorityQueues::default();

		for query in ["l1", "l2", "l3"] {
			queues.enqueue(request(query, Priority::Low));
		}
		for query in ["m1", "m2"] {
			queues.enqueue(request(query, Priority::Medium));
		}

		queues.enqueue(request("h1", Priority::High));

		let (priority, batch) = queues.dequeue_up_to(10).expect("Expected a batch.");

		assert_eq!(priority, Priority::High);
		assert_eq!(queries(&batch), vec!["h1"]);
		assert_eq!(queues.sizes(), QueueDepths { high: 0, medium: 2, low: 3 });

		let (priority, batch) = queues.dequeue_up_to(10).expect("Expected a batch.");

		assert_eq!(priority, Priority::Medium);
		assert_eq!(queries(&batch), vec!["m1", "m2"]);
	}

	#[test]
	fn respects_limit_and_fifo_order() {
		let mut queues = PriorityQueues::default();

		for idx in 0..5 {
			queues.enqueue(request(&format!("q{idx}"), Priority::Medium));
		}

		let (_, first) = queues.dequeue_up_to(3).expect("Expected a batch.");
		let (_, second) = queues.dequeue_up_to(3).expect("Expected a batch.");

		assert_eq!(queries(&first), vec!["q0", "q1", "q2"]);
		assert_eq!(queries(&second), vec!["q3", "q4"]);
		assert!(queues.dequeue_up_to(3).is_none());
	}

	#[test]
	fn zero_limit_takes_nothing() {
		let mut queues = PriorityQueues::default();

		queues.enqueue(request("q", Priority::Low));

		assert!(queues.dequeue_up_to(0).is_none());
		assert_eq!(queues.sizes().low, 1);
	}

	#[test]
	fn drain_all_empties_every_lane() {
		let mut queues = PriorityQueues::default();

		queues.enqueue(request("l", Priority::Low));
		queues.enqueue(request("h", Priority::High));

		let drained = queues.drain_all();

		assert_eq!(queries(&drained), vec!["h", "l"]);
		assert!(queues.is_empty());
	}
}

//! Order placement: one ticket per requested seat at the projection's price

use chrono::Utc;
use uuid::Uuid;

use super::models::{Entity, Hall, NewOrder, Order, OrderDetails, Projection, Ticket};
use super::repository::Catalog;
use crate::error::{Error, Result};

impl Catalog {
    /// Create an order and its tickets for `username`
    pub async fn place_order(&self, username: &str, request: NewOrder) -> Result<OrderDetails> {
        request.validate()?;
        let _writes = self.write_lock().await;
        let projection: Projection = self.get(request.projection_id).await?;
        let hall: Hall = self.get(projection.hall_id).await?;

        if request.seats.len() > hall.capacity() as usize {
            return Err(Error::validation(format!(
                "hall '{}' has only {} seats",
                hall.name,
                hall.capacity()
            )));
        }
        if let Some(seat) = request
            .seats
            .iter()
            .find(|s| s.row > hall.rows || s.seat > hall.seats_per_row)
        {
            return Err(Error::validation(format!(
                "row {} seat {} is not in hall '{}'",
                seat.row, seat.seat, hall.name
            )));
        }

        let order_id = Uuid::new_v4();
        let tickets: Vec<Ticket> = request
            .seats
            .iter()
            .map(|seat| Ticket {
                id: Uuid::new_v4(),
                projection_id: projection.id,
                order_id: Some(order_id),
                row: seat.row,
                seat: seat.seat,
                price_cents: projection.price_cents,
            })
            .collect();

        let total_cents = tickets
            .iter()
            .try_fold(0i64, |total, t| total.checked_add(t.price_cents))
            .ok_or_else(|| Error::validation("order total is out of range"))?;

        let order = Order {
            id: order_id,
            username: username.to_string(),
            projection_id: projection.id,
            ticket_ids: tickets.iter().map(Ticket::id).collect(),
            total_cents,
            created_at: Utc::now(),
        };
        order.validate()?;

        // Tickets first, so a visible order always has its tickets
        let mut stored = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            stored.push(self.tickets.insert(ticket).await?);
        }
        let order = self.orders.insert(order).await?;

        tracing::info!(
            "Order {} placed by '{}' for {} seat(s)",
            order.id,
            username,
            stored.len()
        );
        Ok(OrderDetails {
            order,
            tickets: stored,
        })
    }

    /// Order with its tickets
    pub async fn order_details(&self, id: Uuid) -> Result<OrderDetails> {
        let order: Order = self.get(id).await?;
        let tickets = self.tickets.find_by(|t| t.order_id == Some(id)).await;
        Ok(OrderDetails { order, tickets })
    }

    pub async fn orders_of(&self, username: &str) -> Vec<Order> {
        self.orders.find_by(|o| o.username == username).await
    }

    /// Remove an order together with its tickets
    pub async fn cancel_order(&self, id: Uuid) -> Result<Order> {
        let _writes = self.write_lock().await;
        let order = self.orders.remove(id).await?;
        for ticket in self.tickets.find_by(|t| t.order_id == Some(id)).await {
            self.tickets.remove(ticket.id).await?;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cinema, Movie, SeatRequest, MAX_PRICE_CENTS};

    async fn projection(catalog: &Catalog) -> Projection {
        let cinema = catalog
            .create(Cinema {
                id: Uuid::nil(),
                name: "Arena".into(),
                city: "Belgrade".into(),
                address: "Main 1".into(),
            })
            .await
            .unwrap();
        let hall = catalog
            .create(Hall {
                id: Uuid::nil(),
                cinema_id: cinema.id,
                name: "1".into(),
                rows: 10,
                seats_per_row: 10,
            })
            .await
            .unwrap();
        let movie = catalog
            .create(Movie {
                id: Uuid::nil(),
                title: "Heat".into(),
                description: None,
                genre: None,
                director: None,
                duration_minutes: 170,
                release_year: Some(1995),
            })
            .await
            .unwrap();
        catalog
            .create(Projection {
                id: Uuid::nil(),
                movie_id: movie.id,
                hall_id: hall.id,
                program_id: None,
                starts_at: Utc::now(),
                price_cents: 750,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_place_order() {
        let catalog = Catalog::new();
        let projection = projection(&catalog).await;

        let details = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: projection.id,
                    seats: vec![SeatRequest { row: 1, seat: 1 }, SeatRequest { row: 1, seat: 2 }],
                },
            )
            .await
            .unwrap();

        assert_eq!(details.tickets.len(), 2);
        assert_eq!(details.order.total_cents, 1500);
        assert_eq!(details.order.ticket_ids.len(), 2);
        assert_eq!(catalog.orders_of("alice").await.len(), 1);
        assert!(catalog.orders_of("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_order_for_missing_projection() {
        let catalog = Catalog::new();
        let err = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: Uuid::new_v4(),
                    seats: vec![SeatRequest { row: 1, seat: 1 }],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_order_removes_tickets() {
        let catalog = Catalog::new();
        let projection = projection(&catalog).await;
        let details = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: projection.id,
                    seats: vec![SeatRequest { row: 2, seat: 3 }],
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            catalog.delete::<Order>(details.order.id).await,
            Err(Error::Conflict(_))
        ));
        catalog.cancel_order(details.order.id).await.unwrap();
        assert_eq!(catalog.tickets.count().await, 0);
        assert_eq!(catalog.orders.count().await, 0);
    }

    fn seats(n: u16) -> Vec<SeatRequest> {
        (1..=n).map(|seat| SeatRequest { row: 1, seat }).collect()
    }

    #[tokio::test]
    async fn test_order_total_at_price_cap() {
        let catalog = Catalog::new();
        let projection = projection(&catalog).await;

        let err = catalog
            .update(projection.id, Projection { price_cents: i64::MAX, ..projection.clone() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        catalog
            .update(
                projection.id,
                Projection { price_cents: MAX_PRICE_CENTS, ..projection.clone() },
            )
            .await
            .unwrap();
        let details = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: projection.id,
                    seats: seats(10),
                },
            )
            .await
            .unwrap();
        assert_eq!(details.order.total_cents, 10 * MAX_PRICE_CENTS);
    }

    #[tokio::test]
    async fn test_seat_outside_hall() {
        let catalog = Catalog::new();
        let projection = projection(&catalog).await;

        for seat in [SeatRequest { row: 11, seat: 1 }, SeatRequest { row: 1, seat: 11 }] {
            let err = catalog
                .place_order(
                    "alice",
                    NewOrder {
                        projection_id: projection.id,
                        seats: vec![seat],
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        let err = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: projection.id,
                    seats: vec![SeatRequest { row: 1, seat: 1 }; 101],
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("only 100 seats"));
        assert_eq!(catalog.tickets.count().await, 0);
        assert_eq!(catalog.orders.count().await, 0);
    }

    #[tokio::test]
    async fn test_ordered_tickets_belong_to_order() {
        let catalog = Catalog::new();
        let projection = projection(&catalog).await;
        let details = catalog
            .place_order(
                "alice",
                NewOrder {
                    projection_id: projection.id,
                    seats: seats(2),
                },
            )
            .await
            .unwrap();
        let ticket = details.tickets[0].clone();

        assert!(matches!(
            catalog.delete::<Ticket>(ticket.id).await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            catalog
                .update(ticket.id, Ticket { order_id: None, price_cents: 0, ..ticket.clone() })
                .await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            catalog.create(Ticket { row: 9, ..ticket.clone() }).await,
            Err(Error::Validation(_))
        ));

        let order = catalog.order_details(details.order.id).await.unwrap();
        assert_eq!(order.tickets.len(), 2);
        assert_eq!(order.order.total_cents, 1500);

        // Box-office tickets without an order stay freely editable
        let loose = catalog
            .create(Ticket { order_id: None, ..ticket })
            .await
            .unwrap();
        catalog.delete::<Ticket>(loose.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_unknown_order() {
        let catalog = Catalog::new();
        let err = catalog.cancel_order(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
